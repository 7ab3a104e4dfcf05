use crate::args::CliArgs;
use crate::commands::common::{encode_input, write_out};

pub(crate) fn run(args: &CliArgs) {
    let stream = encode_input(args);
    write_out(&stream.to_string());
}
