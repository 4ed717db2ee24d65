use std::path::PathBuf;

use pushbridge::config::ClientConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    pushbridge::init_tracing();
    if let Err(error) = run().await {
        eprintln!("pushbridge client failed: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let mut config = ClientConfig::from_env().map_err(|e| e.to_string())?;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            print_help();
            return Ok(());
        }

        if let Some(value) = arg.strip_prefix("--server-url=") {
            config.server_url = value.trim_end_matches('/').to_string();
            continue;
        }
        if arg == "--server-url" {
            let value = args
                .next()
                .ok_or_else(|| "--server-url requires a value".to_string())?;
            config.server_url = value.trim_end_matches('/').to_string();
            continue;
        }

        if let Some(value) = arg.strip_prefix("--title=") {
            config.title = value.to_string();
            continue;
        }
        if arg == "--title" {
            config.title = args
                .next()
                .ok_or_else(|| "--title requires a value".to_string())?;
            continue;
        }

        if let Some(value) = arg.strip_prefix("--words=") {
            config.words_path = PathBuf::from(value);
            continue;
        }
        if arg == "--words" {
            let value = args
                .next()
                .ok_or_else(|| "--words requires a value".to_string())?;
            config.words_path = PathBuf::from(value);
            continue;
        }

        if let Some(value) = arg.strip_prefix("--seed=") {
            config.seed = Some(parse_seed(value)?);
            continue;
        }
        if arg == "--seed" {
            let value = args
                .next()
                .ok_or_else(|| "--seed requires a value".to_string())?;
            config.seed = Some(parse_seed(&value)?);
            continue;
        }

        return Err(format!("unknown argument '{arg}'. Use --help for usage"));
    }

    pushbridge::run_client(config)
        .await
        .map_err(|e| e.to_string())
}

fn parse_seed(value: &str) -> Result<u64, String> {
    value
        .parse()
        .map_err(|e| format!("invalid --seed value '{value}': {e}"))
}

fn print_help() {
    println!("pushbridge game client");
    println!();
    println!("Usage:");
    println!("  pushbridge-client [options]");
    println!();
    println!("Options:");
    println!("  --server-url <url>   Control server (default: http://localhost:8080, env PUSHBRIDGE_SERVER_URL)");
    println!("  --title <name>       Game name shown in the title (default: password, env PUSHBRIDGE_TITLE)");
    println!("  --words <path>       Word list, one per line (default: ./allwords.txt, env PUSHBRIDGE_WORDS)");
    println!("  --seed <n>           Fixed shuffle seed (env PUSHBRIDGE_SEED)");
}
