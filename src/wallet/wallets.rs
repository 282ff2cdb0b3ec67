use crate::error::Result;
use crate::utils::{deserialize, serialize};
use crate::wallet::Wallet;
use log::info;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const WALLET_FILE: &str = "wallet.dat";

/// Wallets kept in a single bincode file inside the data directory.
pub struct Wallets {
    path: PathBuf,
    wallets: HashMap<String, Wallet>,
}

impl Wallets {
    /// Opens the wallet file in `data_dir`, starting empty if there is none.
    pub fn open(data_dir: &Path) -> Result<Wallets> {
        let path = data_dir.join(WALLET_FILE);
        let wallets = if path.exists() {
            let mut file = File::open(&path)?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            deserialize(&buf)?
        } else {
            HashMap::new()
        };
        Ok(Wallets { path, wallets })
    }

    pub fn create_wallet(&mut self) -> Result<String> {
        let wallet = Wallet::new()?;
        let address = wallet.get_address();
        self.wallets.insert(address.clone(), wallet);
        self.save_to_file()?;
        info!("Created wallet {address}");
        Ok(address)
    }

    pub fn get_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.wallets.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn get_wallet(&self, address: &str) -> Option<&Wallet> {
        self.wallets.get(address)
    }

    fn save_to_file(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&serialize(&self.wallets)?)?;
        writer.flush()?;
        Ok(())
    }
}
