mod args;
mod commands;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let args = match args::parse_args() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}");
            if !e.starts_with("Usage:") {
                eprintln!("{}", args::usage());
            }
            std::process::exit(2);
        }
    };
    init_logging(args.verbose);

    match args.cmd.as_str() {
        "nodes" => commands::nodes::run(&args),
        "dump" => commands::dump::run(&args),
        "json" => commands::json::run(&args),
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!("{}", args::usage());
            std::process::exit(2);
        }
    }
}
