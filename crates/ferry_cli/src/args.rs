use ferry_core::DEFAULT_MAX_DEPTH;

#[derive(Debug)]
pub(crate) struct CliArgs {
    pub cmd: String,
    pub verbose: bool,
    pub max_depth: usize,
    pub positional: Vec<String>,
}

pub(crate) fn usage() -> &'static str {
    "Usage: ferry <nodes|dump|json> [verbose] [max-depth=N] <file|->"
}

pub(crate) fn parse_args() -> Result<CliArgs, String> {
    parse_from(std::env::args().skip(1).collect())
}

fn parse_from(mut argv: Vec<String>) -> Result<CliArgs, String> {
    if argv.is_empty() {
        return Err(usage().to_string());
    }
    let cmd = argv.remove(0);

    let mut verbose = false;
    let mut max_depth = DEFAULT_MAX_DEPTH;
    let mut positional: Vec<String> = Vec::new();

    for a in argv {
        if a.starts_with("--") {
            return Err(format!("Unknown option: {a}"));
        }
        if a == "verbose" {
            verbose = true;
        } else if let Some(n) = a.strip_prefix("max-depth=") {
            max_depth = n
                .parse()
                .map_err(|_| format!("Invalid max-depth: {n}"))?;
        } else {
            positional.push(a);
        }
    }

    Ok(CliArgs {
        cmd,
        verbose,
        max_depth,
        positional,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(a: &[&str]) -> Vec<String> {
        a.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_word_flags() {
        let args = parse_from(argv(&["dump", "verbose", "max-depth=4", "in.json"])).unwrap();
        assert_eq!(args.cmd, "dump");
        assert!(args.verbose);
        assert_eq!(args.max_depth, 4);
        assert_eq!(args.positional, ["in.json"]);
    }

    #[test]
    fn rejects_dashed_options_and_bad_depth() {
        assert_eq!(
            parse_from(argv(&["dump", "--verbose"])).err().as_deref(),
            Some("Unknown option: --verbose")
        );
        assert!(parse_from(argv(&["dump", "max-depth=x"])).is_err());
        assert!(parse_from(Vec::new()).unwrap_err().starts_with("Usage:"));
    }
}
