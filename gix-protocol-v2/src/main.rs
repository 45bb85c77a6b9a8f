use std::{
    fs::File,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use gix_protocol_v2::{
    capabilities::{name as capability, Capability, CapabilityAdvertisement},
    command::{name as arg, Argument, CommandRequest},
    fetch::{Completion, FetchResponse},
    ls_refs::ListReferencesResponse,
    DecodeOptions, SectionOrder, WriteTo,
};

/// Encode protocol v2 requests to stdout and decode responses from stdin.
#[derive(Debug, Parser)]
#[command(name = "gix-protocol-v2", version, about)]
struct Args {
    /// Log more, repeat for even more output.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Subcommands,
}

#[derive(Debug, Subcommand)]
enum Subcommands {
    /// Write an `ls-refs` request.
    LsRefsRequest {
        /// Show the targets of symbolic refs.
        #[arg(long)]
        symrefs: bool,
        /// Show peeled tags.
        #[arg(long)]
        peel: bool,
        /// Show `HEAD` even if it points to an unborn branch.
        #[arg(long)]
        unborn: bool,
        /// Only list refs with this prefix.
        #[arg(long = "ref-prefix", value_name = "PREFIX")]
        ref_prefixes: Vec<String>,
        /// A capability to send, like `agent=git/2.45.0`.
        #[arg(long = "capability", value_name = "KEY[=VALUE]", value_parser = Capability::from_spec)]
        capabilities: Vec<Capability>,
    },
    /// Write a `fetch` request that ends negotiation right away.
    FetchRequest {
        /// An object to fetch.
        #[arg(long = "want", value_name = "OID", required = true)]
        wants: Vec<String>,
        /// An object the client already has.
        #[arg(long = "have", value_name = "OID")]
        haves: Vec<String>,
        /// A ref to fetch by name.
        #[arg(long = "want-ref", value_name = "REF")]
        want_refs: Vec<String>,
        #[arg(long)]
        thin_pack: bool,
        #[arg(long)]
        no_progress: bool,
        #[arg(long)]
        include_tag: bool,
        #[arg(long)]
        ofs_delta: bool,
        /// A commit the client only has a shallow copy of.
        #[arg(long = "shallow", value_name = "OID")]
        shallow: Vec<String>,
        #[arg(long, value_name = "DEPTH")]
        deepen: Option<u32>,
        #[arg(long)]
        deepen_relative: bool,
        #[arg(long, value_name = "TIMESTAMP")]
        deepen_since: Option<String>,
        #[arg(long, value_name = "REV")]
        deepen_not: Vec<String>,
        /// A filter-spec like `blob:none`.
        #[arg(long, value_name = "SPEC")]
        filter: Option<String>,
        /// URI protocols to accept in place of parts of the pack, comma separated.
        #[arg(long, value_name = "PROTOCOLS")]
        packfile_uris: Option<String>,
        /// Multiplex the entire response.
        #[arg(long)]
        sideband_all: bool,
        /// Ask the server not to send `ready` during negotiation.
        #[arg(long)]
        wait_for_done: bool,
        /// A capability to send, like `agent=git/2.45.0`.
        #[arg(long = "capability", value_name = "KEY[=VALUE]", value_parser = Capability::from_spec)]
        capabilities: Vec<Capability>,
    },
    /// Decode a capability advertisement and print one capability per line.
    Capabilities,
    /// Decode an `ls-refs` response and print one reference per line.
    LsRefs,
    /// Decode a `fetch` response, write the pack and print a summary to stderr.
    Fetch {
        /// Write the pack to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Accept sections out of order.
        #[arg(long)]
        lenient: bool,
        /// The request asked for `sideband-all`.
        #[arg(long)]
        sideband_all: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.cmd {
        Subcommands::LsRefsRequest {
            symrefs,
            peel,
            unborn,
            ref_prefixes,
            capabilities,
        } => {
            let mut request = CommandRequest::new(capability::LS_REFS);
            request.capabilities.extend(capabilities);
            for (enabled, name) in [(symrefs, arg::SYMREFS), (peel, arg::PEEL), (unborn, arg::UNBORN)] {
                if enabled {
                    request.arguments.push(Argument::new(name));
                }
            }
            request
                .arguments
                .extend(ref_prefixes.into_iter().map(|p| Argument::new(arg::REF_PREFIX).with_value(p)));
            write_request(&request)
        }
        Subcommands::FetchRequest {
            wants,
            haves,
            want_refs,
            thin_pack,
            no_progress,
            include_tag,
            ofs_delta,
            shallow,
            deepen,
            deepen_relative,
            deepen_since,
            deepen_not,
            filter,
            packfile_uris,
            sideband_all,
            wait_for_done,
            capabilities,
        } => {
            let mut request = CommandRequest::new(capability::FETCH);
            request.capabilities.extend(capabilities);
            let valued = |name: &str, values: Vec<String>| {
                values
                    .into_iter()
                    .map(move |value| Argument::new(name).with_value(value))
                    .collect::<Vec<_>>()
            };
            let arguments = &mut request.arguments;
            for (enabled, name) in [
                (thin_pack, arg::THIN_PACK),
                (no_progress, arg::NO_PROGRESS),
                (include_tag, arg::INCLUDE_TAG),
                (ofs_delta, arg::OFS_DELTA),
                (deepen_relative, arg::DEEPEN_RELATIVE),
                (sideband_all, arg::SIDEBAND_ALL),
                (wait_for_done, arg::WAIT_FOR_DONE),
            ] {
                if enabled {
                    arguments.push(Argument::new(name));
                }
            }
            arguments.extend(valued(arg::WANT, wants));
            arguments.extend(valued(arg::WANT_REF, want_refs));
            arguments.extend(valued(arg::HAVE, haves));
            arguments.extend(valued(arg::SHALLOW, shallow));
            arguments.extend(valued(arg::DEEPEN, deepen.map(|d| d.to_string()).into_iter().collect()));
            arguments.extend(valued(arg::DEEPEN_SINCE, deepen_since.into_iter().collect()));
            arguments.extend(valued(arg::DEEPEN_NOT, deepen_not));
            arguments.extend(valued(arg::FILTER, filter.into_iter().collect()));
            arguments.extend(valued(arg::PACKFILE_URIS, packfile_uris.into_iter().collect()));
            arguments.push(Argument::new(arg::DONE));
            write_request(&request)
        }
        Subcommands::Capabilities => {
            let advertisement = CapabilityAdvertisement::read_from(&mut DecodeOptions::default().reader(io::stdin().lock()))
                .context("could not decode capability advertisement")?;
            let mut out = io::stdout().lock();
            for capability in &advertisement.capabilities {
                writeln!(out, "{capability}")?;
            }
            Ok(())
        }
        Subcommands::LsRefs => {
            let response = ListReferencesResponse::read_from(&mut DecodeOptions::default().reader(io::stdin().lock()))
                .context("could not decode ls-refs response")?;
            let mut out = io::stdout().lock();
            for reference in &response.references {
                writeln!(out, "{reference}")?;
            }
            Ok(())
        }
        Subcommands::Fetch {
            output,
            lenient,
            sideband_all,
        } => {
            let options = DecodeOptions::default()
                .with_section_order(if lenient {
                    SectionOrder::Lenient
                } else {
                    SectionOrder::Strict
                })
                .with_sideband_all(sideband_all)
                .with_trace(args.verbose > 2);
            let mut pack: Box<dyn Write> = match output {
                Some(path) => Box::new(
                    File::create(&path).with_context(|| format!("could not create '{}'", path.display()))?,
                ),
                None => Box::new(io::stdout().lock()),
            };
            let mut progress = io::stderr().lock();
            let (response, completion) = FetchResponse::read_from(
                &mut options.reader(io::stdin().lock()),
                &options,
                &mut pack,
                &mut progress,
            )
            .context("could not decode fetch response")?;
            pack.flush()?;
            print_summary(&response, completion, &mut progress)?;
            Ok(())
        }
    }
}

fn write_request(request: &CommandRequest) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    request.write_to(&mut out)?;
    out.flush()?;
    Ok(())
}

fn print_summary(response: &FetchResponse, completion: Completion, out: &mut dyn Write) -> io::Result<()> {
    if let Some(acks) = &response.acknowledgements {
        for oid in &acks.acks {
            writeln!(out, "ACK {oid}")?;
        }
        if acks.nak {
            writeln!(out, "NAK")?;
        }
        if acks.ready {
            writeln!(out, "ready")?;
        }
    }
    if let Some(info) = &response.shallow_info {
        for shallow in &info.shallow {
            writeln!(out, "shallow {}", shallow.object_id)?;
        }
        for unshallow in &info.unshallow {
            writeln!(out, "unshallow {}", unshallow.object_id)?;
        }
    }
    for wanted in response.wanted_refs.iter().flatten() {
        writeln!(out, "wanted-ref {} {}", wanted.object_id, wanted.name)?;
    }
    for uri in response.packfile_uris.iter().flatten() {
        writeln!(out, "packfile-uri {uri}")?;
    }
    if completion == Completion::Acknowledgements {
        writeln!(out, "negotiation continues")?;
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
