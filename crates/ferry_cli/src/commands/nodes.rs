use std::fmt::Write;

use crate::args::CliArgs;
use crate::commands::common::{encode_input, write_out};

/// One node per line: the kind, then the value's type and text for names
/// and items.
pub(crate) fn run(args: &CliArgs) {
    let stream = encode_input(args);
    let mut text = String::new();
    for node in stream.nodes() {
        let _ = match node.value() {
            Some(v) => writeln!(text, "{}\t{}\t{}", node.kind_name(), v.type_name(), v),
            None => writeln!(text, "{}", node.kind_name()),
        };
    }
    write_out(&text);
}
