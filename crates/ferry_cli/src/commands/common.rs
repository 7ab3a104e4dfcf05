use std::io::{Read, Write};

use ferry_core::{EncodeConfig, Encoder, HostValue, Serialization, Value};

use crate::args::CliArgs;

/// A parsed JSON document seen as a host structure: objects become labeled
/// containers, arrays positional ones, `true`/`false` become `1`/`0` and
/// `null` is void.
pub(crate) struct JsonHost<'j>(pub &'j serde_json::Value);

impl HostValue for JsonHost<'_> {
    fn encode(&self, enc: &mut Encoder<'_, '_>) -> ferry_core::Result<()> {
        use serde_json::Value as J;
        match self.0 {
            J::Null => enc.item(Value::Void),
            J::Bool(b) => enc.item(Value::from(*b)),
            J::Number(n) => {
                let v = if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                };
                enc.item(v)
            }
            J::String(s) => enc.item(Value::str(s)),
            J::Array(items) => {
                enc.open()?;
                for item in items {
                    enc.value(&JsonHost(item))?;
                }
                enc.close()
            }
            J::Object(map) => {
                enc.open()?;
                for (k, v) in map {
                    enc.name(Value::str(k))?;
                    enc.value(&JsonHost(v))?;
                }
                enc.close()
            }
        }
    }
}

pub(crate) fn read_input(path: &str) -> Result<String, String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| format!("Read failed: {e}"))?;
        return Ok(text);
    }
    std::fs::read_to_string(path).map_err(|e| format!("Read failed: {e}"))
}

/// Reads the single input argument and encodes it, exiting with 2 on usage
/// or input errors and 1 when the document cannot be encoded.
pub(crate) fn encode_input(args: &CliArgs) -> Serialization<'static> {
    if args.positional.len() != 1 {
        eprintln!("Missing <file>");
        std::process::exit(2);
    }
    let text = match read_input(&args.positional[0]) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    let doc: serde_json::Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Invalid JSON: {e}");
            std::process::exit(2);
        }
    };
    let config = EncodeConfig {
        max_depth: args.max_depth,
        ..EncodeConfig::default()
    };
    match ferry_core::host::encode(&JsonHost(&doc), config) {
        Ok(s) => {
            tracing::debug!(target: "ferry::cli", nodes = s.len(), "document encoded");
            s
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

/// Writes `text` to stdout. A closed pipe ends the program quietly.
pub(crate) fn write_out(text: &str) {
    let mut out = std::io::stdout().lock();
    if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
        if e.kind() == std::io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("stdout error: {e}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use ferry_core::{Node, host};

    use super::*;

    #[test]
    fn json_maps_onto_containers() {
        let doc: serde_json::Value =
            serde_json::from_str(r#"{"a": [1, -2, 2.5, true, null, "x"]}"#).unwrap();
        let s = host::encode(&JsonHost(&doc), EncodeConfig::default()).unwrap();
        let nodes: Vec<_> = s.nodes().collect();
        assert_eq!(
            nodes,
            [
                Node::Open,
                Node::Name(Value::str("a")),
                Node::Open,
                Node::Item(Value::Int(1)),
                Node::Item(Value::Int(-2)),
                Node::Item(Value::Double(2.5)),
                Node::Item(Value::UInt(1)),
                Node::Item(Value::Void),
                Node::Item(Value::str("x")),
                Node::Close,
                Node::Close,
            ]
        );
    }

    #[test]
    fn large_unsigned_numbers_stay_unsigned() {
        let doc: serde_json::Value = serde_json::from_str("18446744073709551615").unwrap();
        let s = host::encode(&JsonHost(&doc), EncodeConfig::default()).unwrap();
        assert_eq!(s.root_item(), Some(Value::UInt(u64::MAX)));
    }
}
