use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "hashlink-ledger")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createwallet", about = "Create a new wallet")]
    Createwallet,
    #[command(name = "listaddresses", about = "Print local wallet addresses")]
    ListAddresses,
    #[command(name = "createchain", about = "Create a new chain")]
    Createchain {
        #[arg(help = "The address to send the genesis reward to")]
        address: String,
    },
    #[command(
        name = "getbalance",
        about = "Get the balance of the target address"
    )]
    GetBalance {
        #[arg(help = "The wallet address")]
        address: String,
    },
    #[command(name = "send", about = "Pay an amount from a local wallet")]
    Send {
        #[arg(help = "Source wallet address")]
        from: String,
        #[arg(help = "Destination address")]
        to: String,
        #[arg(help = "Amount to send")]
        amount: u64,
        #[arg(long, default_value_t = 0, help = "Fee left for the miner")]
        fee: u64,
        #[arg(long, help = "Mine a block locally instead of submitting to the node")]
        mine: bool,
    },
    #[command(name = "mine", about = "Mine pending transactions into a block")]
    Mine {
        #[arg(help = "The address to send the block reward to")]
        address: String,
    },
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain,
    #[command(name = "verifychain", about = "Verify the whole chain")]
    Verifychain,
    #[command(name = "resolve", about = "Adopt the longest valid chain among peers")]
    Resolve {
        #[arg(help = "Peer addresses, e.g. 127.0.0.1:2002")]
        peers: Vec<String>,
    },
    #[command(name = "startnode", about = "Start a ledger node")]
    StartNode {
        #[arg(help = "Enable mining mode and send rewards to ADDRESS")]
        miner: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send() {
        let opt = Opt::parse_from(["hashlink-ledger", "send", "aa", "bb", "10", "--fee", "2"]);
        match opt.command {
            Command::Send {
                from,
                to,
                amount,
                fee,
                mine,
            } => {
                assert_eq!(
                    (from.as_str(), to.as_str(), amount, fee, mine),
                    ("aa", "bb", 10, 2, false)
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_resolve_peers() {
        let opt = Opt::parse_from(["hashlink-ledger", "resolve", "127.0.0.1:1", "127.0.0.1:2"]);
        assert!(matches!(opt.command, Command::Resolve { peers } if peers.len() == 2));
    }
}
