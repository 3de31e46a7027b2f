use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{ChainAccess, HttpChainAccess, MarketClient, SessionState};
use shared::domain::{Address, HouseId, HouseRecord, Wei};

const WEI_PER_ETH: u128 = 1_000_000_000_000_000_000;

#[derive(Parser, Debug)]
#[command(name = "house-market", about = "House market session client")]
struct Args {
    /// Gateway node base URL.
    #[arg(long, default_value = "http://127.0.0.1:8545")]
    gateway_url: String,
    /// Identity this session acts as, as a 0x-prefixed hex address.
    #[arg(long)]
    caller: Address,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current session snapshot.
    Status,
    /// Mint a new house. With --target (manager only), mint to another identity.
    Mint {
        #[arg(long)]
        target: Option<Address>,
    },
    /// List a house for sale at a price in wei.
    List { house_id: u64, price: Wei },
    /// Buy a listed house at its current price.
    Buy { house_id: u64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let adapter = HttpChainAccess::new(&args.gateway_url)?;
    let chain: Arc<dyn ChainAccess> = Arc::new(adapter);
    let (client, report) = MarketClient::start_session(chain, args.caller).await;
    if !report.is_complete() {
        eprintln!(
            "warning: {} session queries failed; showing last-known values",
            report.failed.len()
        );
    }

    match args.command {
        Command::Status => {}
        Command::Mint { target } => match client.mint(target).await? {
            Some(id) => println!("minted house {id}"),
            None => println!("mint committed; the new house appears below"),
        },
        Command::List { house_id, price } => {
            client.list(HouseId(house_id), price).await?;
            println!("listed house {house_id} at {} wei", price);
        }
        Command::Buy { house_id } => {
            client.buy(HouseId(house_id)).await?;
            println!("bought house {house_id}");
        }
    }

    print_session(&client.session().await);
    Ok(())
}

fn print_session(session: &SessionState) {
    println!("account: {}", session.caller);
    println!(
        "balance: {} wei ({} ETH)",
        session.caller_balance,
        format_eth(session.caller_balance)
    );
    match session.manager {
        Some(manager) => println!("manager: {manager}"),
        None => println!("manager: (unknown)"),
    }

    println!("my houses:");
    if session.my_houses.is_empty() {
        println!("  (none)");
    }
    for house in &session.my_houses {
        print_house(house);
    }

    println!("houses for sale:");
    if session.listed_houses.is_empty() {
        println!("  (none)");
    }
    for house in &session.listed_houses {
        print_house(house);
    }
}

fn print_house(house: &HouseRecord) {
    if house.is_listed {
        println!(
            "  #{} owner {} price {} wei ({} ETH) listed {}",
            house.house_id,
            house.owner,
            house.price,
            format_eth(house.price),
            house
                .listed_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "-".into()),
        );
    } else {
        println!("  #{} owner {}", house.house_id, house.owner);
    }
}

/// Display-only conversion; amounts submitted to the ledger stay integral.
fn format_eth(amount: Wei) -> String {
    let whole = amount.0 / WEI_PER_ETH;
    let frac = amount.0 % WEI_PER_ETH;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:018}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
