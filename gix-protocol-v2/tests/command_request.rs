use gix_protocol_v2::{
    capabilities::Capability,
    command::{name, Argument, CommandRequest},
    pktline::Reader,
    Error, Kind, Terminator, WriteTo,
};
use pretty_assertions::assert_eq;

fn decode(input: &[u8]) -> gix_protocol_v2::Result<CommandRequest> {
    CommandRequest::read_from(&mut Reader::new(input))
}

#[test]
fn ls_refs_request_encoding() {
    let request = CommandRequest::new("ls-refs")
        .with_capability(Capability::new("agent").with_value("git/2.45.0"))
        .with_capability(Capability::new("object-format").with_value("sha1"))
        .with_argument(Argument::new(name::PEEL))
        .with_argument(Argument::new(name::SYMREFS))
        .with_argument(Argument::new(name::REF_PREFIX).with_value("refs/heads/"));
    let expected: &[u8] =
        b"0014command=ls-refs\n0015agent=git/2.45.0\n0017object-format=sha1\n00010008peel000bsymrefs001aref-prefix refs/heads/0000";
    assert_eq!(request.to_bytes().unwrap(), expected);
    assert_eq!(decode(expected).unwrap(), request);
}

#[test]
fn request_without_capabilities_or_arguments() {
    let request = CommandRequest::new("fetch");
    let bytes = request.to_bytes().unwrap();
    assert_eq!(bytes, b"0012command=fetch\n00010000");
    assert_eq!(decode(&bytes).unwrap(), request);
}

#[test]
fn arguments_sent_with_newline_are_accepted() {
    let request = decode(b"0012command=fetch\n0001000ewant 1234\n0009done\n0000").unwrap();
    assert_eq!(request.arguments.value(name::WANT).unwrap(), "1234");
    assert!(request.arguments.has(name::DONE));
    assert_eq!(request.arguments.to_string(), "<want 1234,done>");
}

#[test]
fn command_prefix_is_required() {
    let err = decode(b"000ffetch=1234\n00010000").unwrap_err();
    assert!(matches!(err, Error::MalformedLine { what: "command-request", .. }));
}

#[test]
fn capabilities_must_end_with_delimiter() {
    let err = decode(b"0012command=fetch\n0000").unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedTerminator {
            terminator: Terminator::Flush,
            ..
        }
    ));
}

#[test]
fn arguments_must_end_with_flush() {
    let err = decode(b"0012command=fetch\n00010008peel0001").unwrap_err();
    assert_eq!(err.kind(), Kind::UnexpectedTerminator);
}

#[test]
fn argument_with_empty_key_fails_the_request() {
    let err = decode(b"0012command=fetch\n00010009 peel0000").unwrap_err();
    assert_eq!(err.to_string(), r#"invalid argument: " peel""#);
}
