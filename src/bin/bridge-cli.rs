use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Management CLI for the wallet provider bridge", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8787")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show host status
    Status,
    /// List pending decisions
    Pending,
    /// Approve a pending decision
    Approve {
        channel: String,
        id: String,
        /// JSON payload: a signed result, or the accounts to connect
        #[arg(long)]
        payload: Option<String>,
    },
    /// Reject a pending decision
    Reject { channel: String, id: String },
    /// Drop a pending decision without answering
    Dismiss { channel: String, id: String },
    /// List permission grants
    Permissions,
    /// Grant a subject access to accounts
    Grant {
        subject: String,
        #[arg(long = "account", required = true)]
        accounts: Vec<String>,
        /// Restrict the grant to these methods
        #[arg(long = "method")]
        methods: Vec<String>,
    },
    /// Revoke a subject's grant
    Revoke { subject: String },
    /// Send a session request and wait for its response
    Request {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        method: String,
        /// JSON array of params
        #[arg(long, default_value = "[]")]
        params: String,
        #[arg(long, default_value_t = 1)]
        id: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Pending => {
            client
                .get(format!("{}/admin/pending", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Approve {
            channel,
            id,
            payload,
        } => {
            let body = match payload {
                Some(raw) => json!({ "payload": serde_json::from_str::<Value>(&raw)? }),
                None => json!({}),
            };
            client
                .post(format!("{}/admin/pending/{}/{}/approve", cli.url, channel, id))
                .headers(headers)
                .json(&body)
                .send()
                .await?
        }
        Commands::Reject { channel, id } => {
            client
                .post(format!("{}/admin/pending/{}/{}/reject", cli.url, channel, id))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Dismiss { channel, id } => {
            client
                .post(format!("{}/admin/pending/{}/{}/dismiss", cli.url, channel, id))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Permissions => {
            client
                .get(format!("{}/admin/permissions", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Grant {
            subject,
            accounts,
            methods,
        } => {
            let methods = (!methods.is_empty()).then_some(methods);
            client
                .post(format!("{}/admin/permissions", cli.url))
                .headers(headers)
                .json(&json!({ "subject": subject, "accounts": accounts, "methods": methods }))
                .send()
                .await?
        }
        Commands::Revoke { subject } => {
            client
                .post(format!("{}/admin/permissions/revoke", cli.url))
                .headers(headers)
                .json(&json!({ "subject": subject }))
                .send()
                .await?
        }
        Commands::Request {
            topic,
            method,
            params,
            id,
        } => {
            let params: Value = serde_json::from_str(&params)?;
            return session_request(&cli.url, id, &topic, &method, params).await;
        }
    };

    print_response(res).await
}

async fn session_request(
    base: &str,
    id: u64,
    topic: &str,
    method: &str,
    params: Value,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut url = url::Url::parse(base)?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|_| format!("cannot derive websocket url from {}", base))?;
    url.set_path("/session");

    let (mut socket, _) = connect_async(url.as_str()).await?;
    let frame = json!({
        "id": id,
        "params": { "topic": topic, "request": { "method": method, "params": params } }
    });
    socket.send(Message::Text(frame.to_string().into())).await?;
    eprintln!("Waiting for a decision on session:{}/{} ...", topic, id);

    while let Some(message) = socket.next().await {
        match message? {
            Message::Text(text) => {
                let reply: Value = serde_json::from_str(text.as_str())?;
                if reply["topic"] == topic && reply["response"]["id"] == json!(id) {
                    println!("{}", serde_json::to_string_pretty(&reply["response"])?);
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    let _ = socket.close(None).await;
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
