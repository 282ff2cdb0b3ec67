use clap::Parser;
use hashlink_ledger::network::{send_request, Request, Response, TcpPeerSource};
use hashlink_ledger::{
    validate_address, CancellationToken, Chain, ChainStore, Command, EcdsaVerifier, Ledger,
    LedgerError, MemoryPool, Opt, Resolution, Result, Server, Wallets, GLOBAL_CONFIG,
};
use log::{error, info, LevelFilter};
use std::process;
use std::sync::Arc;
use std::time::Duration;

const CHAIN_DIR: &str = "chain";

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn open_store() -> Result<ChainStore> {
    ChainStore::open(&GLOBAL_CONFIG.data_dir().join(CHAIN_DIR))
}

// Loads the persisted chain and pending pool into a ledger.
fn open_ledger(store: &ChainStore) -> Result<Ledger> {
    let chain = store.load_chain()?.ok_or_else(|| {
        LedgerError::Config("No chain found. Use 'createchain' first.".to_string())
    })?;
    let pending = store.load_pending()?;
    Ok(Ledger::new(
        chain,
        pending,
        GLOBAL_CONFIG.ledger_params(),
        Arc::new(EcdsaVerifier),
    ))
}

fn persist(store: &ChainStore, ledger: &Ledger) -> Result<()> {
    let state = ledger.state();
    store.save_chain(&state.chain)?;
    store.save_pending(&state.pending)
}

fn require_address(address: &str) -> Result<()> {
    if validate_address(address) {
        Ok(())
    } else {
        Err(LedgerError::Wallet(format!("Invalid address: {address}")))
    }
}

fn run_command(command: Command) -> Result<()> {
    match command {
        Command::Createwallet => {
            let mut wallets = Wallets::open(&GLOBAL_CONFIG.data_dir())?;
            let address = wallets.create_wallet()?;
            println!("Your new address: {address}")
        }
        Command::ListAddresses => {
            let wallets = Wallets::open(&GLOBAL_CONFIG.data_dir())?;
            for address in wallets.get_addresses() {
                println!("{address}")
            }
        }
        Command::Createchain { address } => {
            require_address(&address)?;
            let store = open_store()?;
            if store.load_chain()?.is_some() {
                return Err(LedgerError::Config("A chain already exists".to_string()));
            }
            let ledger = Ledger::create(
                &address,
                GLOBAL_CONFIG.ledger_params(),
                Arc::new(EcdsaVerifier),
            )?;
            store.save_chain(&ledger.chain())?;
            store.save_pending(&MemoryPool::new())?;
            println!("Done! Genesis block: {}", ledger.trusted_genesis_hash());
        }
        Command::GetBalance { address } => {
            let ledger = open_ledger(&open_store()?)?;
            let balance = ledger.balance(&address)?;
            println!("Balance of {address}: {balance}");
        }
        Command::Send {
            from,
            to,
            amount,
            fee,
            mine,
        } => {
            require_address(&from)?;
            if amount == 0 {
                return Err(LedgerError::Wallet("Amount must be positive".to_string()));
            }
            let wallets = Wallets::open(&GLOBAL_CONFIG.data_dir())?;
            let wallet = wallets
                .get_wallet(&from)
                .ok_or_else(|| LedgerError::Wallet(format!("No local wallet for {from}")))?;

            let store = open_store()?;
            let ledger = open_ledger(&store)?;
            let transaction = ledger.create_payment(wallet, &to, amount, fee)?;

            if mine {
                ledger.submit_transaction(transaction)?;
                let block = ledger.mine_pending(&from, CancellationToken::new())?;
                persist(&store, &ledger)?;
                info!("Mined block {}", block.get_hash());
            } else {
                let request = Request::SubmitTransaction {
                    addr_from: GLOBAL_CONFIG.get_node_addr(),
                    transaction,
                };
                let timeout = Duration::from_millis(GLOBAL_CONFIG.settings().peer_timeout_ms);
                match send_request(&GLOBAL_CONFIG.get_node_addr(), &request, timeout)? {
                    Response::Accepted { hash } => info!("Node accepted transaction {hash}"),
                    Response::Error { message } => return Err(LedgerError::Network(message)),
                    other => {
                        return Err(LedgerError::Network(format!(
                            "Unexpected response: {other:?}"
                        )))
                    }
                }
            }
            println!("Success!")
        }
        Command::Mine { address } => {
            require_address(&address)?;
            let store = open_store()?;
            let ledger = open_ledger(&store)?;
            let block = ledger.mine_pending(&address, CancellationToken::new())?;
            persist(&store, &ledger)?;
            println!("Mined block {}", block.get_hash());
        }
        Command::Printchain => {
            let chain = open_store()?
                .load_chain()?
                .ok_or_else(|| LedgerError::Config("No chain found".to_string()))?;
            print_chain(&chain)?;
        }
        Command::Verifychain => {
            let ledger = open_ledger(&open_store()?)?;
            ledger.verify()?;
            println!("Chain of length {} is valid", ledger.len());
        }
        Command::Resolve { peers } => {
            let store = open_store()?;
            let ledger = open_ledger(&store)?;
            let source = TcpPeerSource::new(Duration::from_millis(
                GLOBAL_CONFIG.settings().peer_timeout_ms,
            ));
            match ledger.resolve(&peers, &source)? {
                Resolution::Replaced(chain) => {
                    persist(&store, &ledger)?;
                    println!("Replaced local chain, new length {}", chain.len());
                }
                Resolution::Authoritative => println!("Local chain is authoritative"),
            }
        }
        Command::StartNode { miner } => {
            if let Some(addr) = miner {
                require_address(&addr)?;
                println!("Mining is on. Address to receive rewards: {addr}");
                GLOBAL_CONFIG.set_mining_addr(addr);
            }
            let store = open_store()?;
            let ledger = Arc::new(open_ledger(&store)?);
            let settings = GLOBAL_CONFIG.settings();
            let server = Server::new(ledger, store, &settings);
            server.run(&settings.node_address)?
        }
    }
    Ok(())
}

fn print_chain(chain: &Chain) -> Result<()> {
    for (height, block) in chain.blocks().iter().enumerate() {
        println!("Height: {height}");
        println!("Previous hash: {}", block.get_previous_hash().unwrap_or("none"));
        println!("Hash: {}", block.get_hash());
        println!("Nonce: {}", block.get_nonce());
        for tx in block.get_transactions() {
            println!("- Transaction {} (fee {})", tx.hash()?, tx.fee());
            for input in tx.inputs() {
                println!(
                    "-- Input {} #{}",
                    input.get_transaction_hash(),
                    input.get_output_index()
                );
            }
            for output in tx.outputs() {
                println!(
                    "-- Output {} to {}",
                    output.get_amount(),
                    output.get_recipient()
                );
            }
        }
        println!()
    }
    Ok(())
}
