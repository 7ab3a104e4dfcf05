use ferry_core::{DecodeConfig, Tree};
use serde_json::{Map, Number, Value as J};

use crate::args::CliArgs;
use crate::commands::common::{encode_input, write_out};

/// Encodes the document, decodes the stream back into a tree and prints
/// that tree as JSON.
pub(crate) fn run(args: &CliArgs) {
    let stream = encode_input(args);
    let tree = match Tree::decode(&stream, DecodeConfig::default()) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    write_out(&format!("{}\n", to_json(&tree)));
}

/// Empty containers decode as positional and come back as `[]`.
pub(crate) fn to_json(tree: &Tree) -> J {
    match tree {
        Tree::Void => J::Null,
        Tree::Double(d) => Number::from_f64(*d).map_or(J::Null, J::Number),
        Tree::UInt(u) => J::from(*u),
        Tree::Int(i) => J::from(*i),
        Tree::String(b) => J::String(String::from_utf8_lossy(b).into_owned()),
        Tree::WideString(w) => J::String(String::from_utf16_lossy(w)),
        Tree::Handle(h) => J::String(format!("<object #{}>", h.class_id())),
        Tree::Positional(items) => J::Array(items.iter().map(to_json).collect()),
        Tree::Labeled(pairs) => {
            let mut map = Map::with_capacity(pairs.len());
            for (k, v) in pairs {
                let key = k.as_value().map(|n| n.to_string()).unwrap_or_default();
                map.insert(key, to_json(v));
            }
            J::Object(map)
        }
    }
}
