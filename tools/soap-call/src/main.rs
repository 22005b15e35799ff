//! soap-call: send one SOAP call and print the reply.
//!
//! ```text
//! soap-call --endpoint http://localhost:8080/calc --namespace urn:calc Add a:int=2 b:int=3
//! ```

mod args;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use soap_client::{BasicAuthentication, CallError, ClientConfig, Message, SoapClient};
use soap_envelope::{Payload, ValueList};
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Send one SOAP call and print the reply
#[derive(Parser, Debug)]
#[command(name = "soap-call")]
#[command(about = "Send one SOAP 1.1 call over HTTP and print the reply")]
struct Args {
    /// Endpoint URL the envelope is POSTed to
    #[arg(short, long)]
    endpoint: String,

    /// Namespace of the method element
    #[arg(short, long)]
    namespace: String,

    /// SoapAction header (default: namespace followed by method)
    #[arg(short, long)]
    action: Option<String>,

    /// Literal use: no xsi:type annotations
    #[arg(long)]
    literal: bool,

    /// Use the blocking call path instead of the asynchronous one
    #[arg(long)]
    sync: bool,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// User name for basic authentication
    #[arg(short, long)]
    user: Option<String>,

    /// Password for basic authentication
    #[arg(short, long, requires = "user")]
    password: Option<String>,

    /// Method to call
    method: String,

    /// Arguments as name[:type]=value
    arguments: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut message = if args.literal {
        Message::literal()
    } else {
        Message::encoded()
    };
    for raw in &args.arguments {
        let (name, payload) = args::parse_argument(raw)?;
        message.add_argument(name, payload);
    }

    let mut config = ClientConfig::new(&args.endpoint, &args.namespace).from_env();
    config.timeout = Duration::from_secs(args.timeout);
    let client = SoapClient::connect(config).context("cannot create SOAP client")?;
    if let Some(user) = &args.user {
        let password = args.password.clone().unwrap_or_default();
        client.set_authenticator(Arc::new(BasicAuthentication::new(user, password)));
    }

    debug!(method = %args.method, sync = args.sync, "Dispatching call");
    let result = if args.sync {
        client.call(&args.method, &message, args.action.as_deref())
    } else {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("cannot start async runtime")?;
        runtime.block_on(async {
            client
                .async_call(&args.method, &message, args.action.as_deref())?
                .await
        })
    };

    match result {
        Ok(reply) => {
            print_values(reply.arguments(), 0);
            Ok(())
        }
        Err(CallError::Fault(fault)) => {
            println!("fault {}: {}", fault.code, fault.message);
            if let Some(actor) = &fault.actor {
                println!("actor: {actor}");
            }
            print_values(&fault.detail, 1);
            bail!("{} returned a SOAP fault", args.method)
        }
        Err(e) => Err(e).with_context(|| format!("{} failed", args.method)),
    }
}

fn print_values(values: &ValueList, depth: usize) {
    let indent = "  ".repeat(depth);
    for value in values {
        match value.payload() {
            Payload::List(nested) => {
                println!("{indent}{}:", value.name());
                print_values(nested, depth + 1);
            }
            payload => println!("{indent}{} = {}", value.name(), payload.to_text()),
        }
    }
}
