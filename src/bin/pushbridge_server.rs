use pushbridge::config::{parse_secs, RetransmitTimeouts, ServerConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    pushbridge::init_tracing();
    if let Err(error) = run().await {
        eprintln!("pushbridge server failed: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let mut config = ServerConfig::from_env().map_err(|e| e.to_string())?;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            print_help();
            return Ok(());
        }

        if let Some(value) = arg.strip_prefix("--bind=") {
            config.bind = parse_bind(value)?;
            continue;
        }
        if arg == "--bind" {
            let value = args
                .next()
                .ok_or_else(|| "--bind requires a value".to_string())?;
            config.bind = parse_bind(&value)?;
            continue;
        }

        if let Some(value) = arg.strip_prefix("--retransmit-secs=") {
            config.retransmit = parse_retransmit(value)?;
            continue;
        }
        if arg == "--retransmit-secs" {
            let value = args
                .next()
                .ok_or_else(|| "--retransmit-secs requires a value".to_string())?;
            config.retransmit = parse_retransmit(&value)?;
            continue;
        }

        return Err(format!("unknown argument '{arg}'. Use --help for usage"));
    }

    pushbridge::run_server(config)
        .await
        .map_err(|e| e.to_string())
}

fn parse_bind(value: &str) -> Result<std::net::SocketAddr, String> {
    value
        .parse()
        .map_err(|e| format!("invalid --bind value '{value}': {e}"))
}

fn parse_retransmit(value: &str) -> Result<RetransmitTimeouts, String> {
    let timeout = parse_secs("--retransmit-secs", value).map_err(|e| e.to_string())?;
    Ok(RetransmitTimeouts::uniform(Some(timeout)))
}

fn print_help() {
    println!("pushbridge control server");
    println!();
    println!("Usage:");
    println!("  pushbridge-server [options]");
    println!();
    println!("Options:");
    println!("  --bind <addr>             Listen address (default: 0.0.0.0:8080, env PUSHBRIDGE_BIND)");
    println!("  --retransmit-secs <n>     Resend every stream's payload after n idle seconds");
    println!("                            (default: never, env PUSHBRIDGE_RETRANSMIT_SECS)");
    println!();
    println!("Endpoints:");
    println!("  GET /start, /next_answer, /shutdown                 Operator triggers");
    println!("  GET /push_start, /push_next_answer, /push_shutdown  Event streams");
}
