//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `wallets` - Wallet records (key: wallet_id)
//! - `transactions` - Append-only transaction log (key: txn_id)
//! - `payouts` - Payout requests (key: payout_id)
//! - `payments` - External-processor payment mirrors (key: payment_id)
//! - `revenue` - Platform revenue rows (key: revenue_id)
//! - `indices` - Secondary indices for fast lookups
//!
//! Every mutation touching more than one record goes through a single
//! `WriteBatch`: a transaction and its wallet update commit together or not
//! at all.

use crate::{
    error::{Error, Result},
    types::{Payment, PayoutRequest, PayoutStatus, PlatformRevenue, Transaction, Wallet},
    Config, PartyId,
};
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_WALLETS: &str = "wallets";
const CF_TRANSACTIONS: &str = "transactions";
const CF_PAYOUTS: &str = "payouts";
const CF_PAYMENTS: &str = "payments";
const CF_REVENUE: &str = "revenue";
const CF_INDICES: &str = "indices";

// Index key namespaces within CF_INDICES
const IDX_PARTY_WALLET: &[u8] = b"pw|";
const IDX_WALLET_TXN: &[u8] = b"wt|";
const IDX_PAYMENT_TXN: &[u8] = b"pt|";
const IDX_PENDING_PAYOUT: &[u8] = b"pp|";
const IDX_WALLET_PAYOUT: &[u8] = b"wo|";
const IDX_STATUS_PAYOUT: &[u8] = b"so|";
const IDX_BOOKING_PAYMENT: &[u8] = b"bp|";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_PAYOUTS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_PAYMENTS, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_REVENUE, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    /// Frequently read records: favor decompression speed
    fn cf_options_hot() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    /// Append-only history: favor compression ratio
    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Wallet operations

    /// Insert or update a wallet together with its party index
    pub fn put_wallet(&self, wallet: &Wallet) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_wallet(&mut batch, wallet)?;
        batch.put_cf(
            &self.cf_handle(CF_INDICES)?,
            Self::index_key_party(&wallet.party),
            wallet.wallet_id.as_bytes(),
        );
        self.db.write(batch)?;
        Ok(())
    }

    /// Get wallet by ID
    pub fn get_wallet(&self, wallet_id: Uuid) -> Result<Wallet> {
        let cf = self.cf_handle(CF_WALLETS)?;
        let value = self
            .db
            .get_cf(&cf, wallet_id.as_bytes())?
            .ok_or_else(|| Error::WalletNotFound(wallet_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Get wallet by owning party (via index)
    pub fn wallet_by_party(&self, party: &PartyId) -> Result<Option<Wallet>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self.db.get_cf(&cf, Self::index_key_party(party))? {
            Some(value) => {
                let wallet_id = Self::uuid_from_bytes(&value)?;
                Ok(Some(self.get_wallet(wallet_id)?))
            }
            None => Ok(None),
        }
    }

    /// All wallets (reconciliation sweep, stats)
    pub fn list_wallets(&self) -> Result<Vec<Wallet>> {
        let cf = self.cf_handle(CF_WALLETS)?;
        let mut wallets = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            wallets.push(bincode::deserialize(&value)?);
        }
        Ok(wallets)
    }

    // Transaction operations

    /// Append a transaction and update its wallet (atomic)
    pub fn apply_transaction(&self, txn: &Transaction, wallet: &Wallet) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_transaction(&mut batch, txn)?;
        self.batch_wallet(&mut batch, wallet)?;
        self.db.write(batch)?;

        tracing::debug!(
            txn_id = %txn.txn_id,
            wallet_id = %txn.wallet_id,
            kind = ?txn.kind,
            amount = %txn.amount,
            "Transaction appended"
        );

        Ok(())
    }

    /// Append a credit, its wallet update, and the platform revenue row
    /// (atomic)
    pub fn apply_credit_with_revenue(
        &self,
        txn: &Transaction,
        wallet: &Wallet,
        revenue: &PlatformRevenue,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();
        self.batch_transaction(&mut batch, txn)?;
        self.batch_wallet(&mut batch, wallet)?;
        batch.put_cf(
            &self.cf_handle(CF_REVENUE)?,
            revenue.revenue_id.as_bytes(),
            bincode::serialize(revenue)?,
        );
        self.db.write(batch)?;

        tracing::debug!(
            txn_id = %txn.txn_id,
            wallet_id = %txn.wallet_id,
            fee = %revenue.amount,
            earning = %revenue.payee_earning,
            "Credit appended with revenue row"
        );

        Ok(())
    }

    /// Get transaction by ID
    pub fn get_transaction(&self, txn_id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = self
            .db
            .get_cf(&cf, txn_id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("Transaction not found: {}", txn_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// All transactions for a wallet, oldest first (via index)
    pub fn wallet_transactions(&self, wallet_id: Uuid) -> Result<Vec<Transaction>> {
        let ids = self.scan_suffix_ids(IDX_WALLET_TXN, wallet_id)?;
        ids.into_iter().map(|id| self.get_transaction(id)).collect()
    }

    /// The transaction already recorded for an external payment, if any
    ///
    /// This index is the idempotency check for webhook retries and
    /// reconciliation re-runs.
    pub fn txn_for_payment(&self, payment_id: Uuid) -> Result<Option<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let key = Self::index_key(IDX_PAYMENT_TXN, payment_id);
        match self.db.get_cf(&cf, key)? {
            Some(value) => Ok(Some(Self::uuid_from_bytes(&value)?)),
            None => Ok(None),
        }
    }

    // Payout operations

    /// Persist a payout state change with everything it moves (atomic)
    ///
    /// `prev_status` is `None` on creation. `wallet` and `txn` are included
    /// in the same batch when the transition moves money (creation, reject,
    /// complete).
    pub fn apply_payout(
        &self,
        payout: &PayoutRequest,
        prev_status: Option<PayoutStatus>,
        wallet: Option<&Wallet>,
        txn: Option<&Transaction>,
    ) -> Result<()> {
        let cf_payouts = self.cf_handle(CF_PAYOUTS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut batch = WriteBatch::default();

        batch.put_cf(
            &cf_payouts,
            payout.payout_id.as_bytes(),
            bincode::serialize(payout)?,
        );

        // Wallet-payout index, written once on creation
        if prev_status.is_none() {
            batch.put_cf(
                &cf_indices,
                Self::index_key_pair(IDX_WALLET_PAYOUT, payout.wallet_id, payout.payout_id),
                b"",
            );
        }

        // Status index: drop the old entry, write the current one
        if let Some(prev) = prev_status {
            if prev != payout.status {
                batch.delete_cf(&cf_indices, Self::index_key_status(prev, payout.payout_id));
            }
        }
        batch.put_cf(
            &cf_indices,
            Self::index_key_status(payout.status, payout.payout_id),
            b"",
        );

        // Pending-payout index enforces at most one open request per wallet
        if payout.status == PayoutStatus::Pending {
            batch.put_cf(
                &cf_indices,
                Self::index_key(IDX_PENDING_PAYOUT, payout.wallet_id),
                payout.payout_id.as_bytes(),
            );
        } else if prev_status == Some(PayoutStatus::Pending) {
            batch.delete_cf(&cf_indices, Self::index_key(IDX_PENDING_PAYOUT, payout.wallet_id));
        }

        if let Some(wallet) = wallet {
            self.batch_wallet(&mut batch, wallet)?;
        }
        if let Some(txn) = txn {
            self.batch_transaction(&mut batch, txn)?;
        }

        self.db.write(batch)?;

        tracing::debug!(
            payout_id = %payout.payout_id,
            wallet_id = %payout.wallet_id,
            status = ?payout.status,
            "Payout persisted"
        );

        Ok(())
    }

    /// Get payout request by ID
    pub fn get_payout(&self, payout_id: Uuid) -> Result<PayoutRequest> {
        let cf = self.cf_handle(CF_PAYOUTS)?;
        let value = self
            .db
            .get_cf(&cf, payout_id.as_bytes())?
            .ok_or_else(|| Error::PayoutNotFound(payout_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// The wallet's open payout request, if any
    pub fn pending_payout(&self, wallet_id: Uuid) -> Result<Option<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self.db.get_cf(&cf, Self::index_key(IDX_PENDING_PAYOUT, wallet_id))? {
            Some(value) => Ok(Some(Self::uuid_from_bytes(&value)?)),
            None => Ok(None),
        }
    }

    /// All payout requests for a wallet, oldest first (via index)
    pub fn payouts_by_wallet(&self, wallet_id: Uuid) -> Result<Vec<PayoutRequest>> {
        let ids = self.scan_suffix_ids(IDX_WALLET_PAYOUT, wallet_id)?;
        ids.into_iter().map(|id| self.get_payout(id)).collect()
    }

    /// All payout requests in a status (via index)
    pub fn payouts_by_status(&self, status: PayoutStatus) -> Result<Vec<PayoutRequest>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let mut prefix = IDX_STATUS_PAYOUT.to_vec();
        prefix.push(status as u8);

        let mut payouts = Vec::new();
        for item in self.db.prefix_iterator_cf(&cf, &prefix) {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let payout_id = Self::uuid_from_bytes(&key[prefix.len()..])?;
            payouts.push(self.get_payout(payout_id)?);
        }
        Ok(payouts)
    }

    /// All payout requests
    pub fn list_payouts(&self) -> Result<Vec<PayoutRequest>> {
        let cf = self.cf_handle(CF_PAYOUTS)?;
        let mut payouts = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            payouts.push(bincode::deserialize(&value)?);
        }
        Ok(payouts)
    }

    // Payment operations

    /// Insert or update a payment together with its booking index
    pub fn put_payment(&self, payment: &Payment) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put_cf(
            &self.cf_handle(CF_PAYMENTS)?,
            payment.payment_id.as_bytes(),
            bincode::serialize(payment)?,
        );
        batch.put_cf(
            &self.cf_handle(CF_INDICES)?,
            Self::index_key(IDX_BOOKING_PAYMENT, payment.booking_id),
            payment.payment_id.as_bytes(),
        );
        self.db.write(batch)?;
        Ok(())
    }

    /// Get payment by ID
    pub fn get_payment(&self, payment_id: Uuid) -> Result<Payment> {
        let cf = self.cf_handle(CF_PAYMENTS)?;
        let value = self
            .db
            .get_cf(&cf, payment_id.as_bytes())?
            .ok_or_else(|| Error::PaymentNotFound(payment_id.to_string()))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Get payment by booking (via index; at most one payment per booking)
    pub fn payment_by_booking(&self, booking_id: Uuid) -> Result<Option<Payment>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self.db.get_cf(&cf, Self::index_key(IDX_BOOKING_PAYMENT, booking_id))? {
            Some(value) => {
                let payment_id = Self::uuid_from_bytes(&value)?;
                Ok(Some(self.get_payment(payment_id)?))
            }
            None => Ok(None),
        }
    }

    /// All payments (external sync sweep)
    pub fn list_payments(&self) -> Result<Vec<Payment>> {
        let cf = self.cf_handle(CF_PAYMENTS)?;
        let mut payments = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            payments.push(bincode::deserialize(&value)?);
        }
        Ok(payments)
    }

    // Revenue operations

    /// All platform revenue rows (financial reporting)
    pub fn list_revenue(&self) -> Result<Vec<PlatformRevenue>> {
        let cf = self.cf_handle(CF_REVENUE)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            rows.push(bincode::deserialize(&value)?);
        }
        Ok(rows)
    }

    // Batch building blocks

    fn batch_wallet(&self, batch: &mut WriteBatch, wallet: &Wallet) -> Result<()> {
        batch.put_cf(
            &self.cf_handle(CF_WALLETS)?,
            wallet.wallet_id.as_bytes(),
            bincode::serialize(wallet)?,
        );
        Ok(())
    }

    fn batch_transaction(&self, batch: &mut WriteBatch, txn: &Transaction) -> Result<()> {
        batch.put_cf(
            &self.cf_handle(CF_TRANSACTIONS)?,
            txn.txn_id.as_bytes(),
            bincode::serialize(txn)?,
        );

        let cf_indices = self.cf_handle(CF_INDICES)?;
        batch.put_cf(
            cf_indices,
            Self::index_key_pair(IDX_WALLET_TXN, txn.wallet_id, txn.txn_id),
            b"",
        );
        if let Some(payment_id) = txn.refs.payment_id {
            batch.put_cf(
                cf_indices,
                Self::index_key(IDX_PAYMENT_TXN, payment_id),
                txn.txn_id.as_bytes(),
            );
        }
        Ok(())
    }

    // Index key helpers

    fn index_key_party(party: &PartyId) -> Vec<u8> {
        let mut key = IDX_PARTY_WALLET.to_vec();
        key.extend_from_slice(party.as_str().as_bytes());
        key
    }

    fn index_key(namespace: &[u8], id: Uuid) -> Vec<u8> {
        let mut key = namespace.to_vec();
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn index_key_pair(namespace: &[u8], first: Uuid, second: Uuid) -> Vec<u8> {
        let mut key = namespace.to_vec();
        key.extend_from_slice(first.as_bytes());
        key.extend_from_slice(second.as_bytes());
        key
    }

    fn index_key_status(status: PayoutStatus, payout_id: Uuid) -> Vec<u8> {
        let mut key = IDX_STATUS_PAYOUT.to_vec();
        key.push(status as u8);
        key.extend_from_slice(payout_id.as_bytes());
        key
    }

    /// Scan `namespace || prefix_id || suffix_id` keys, returning suffix IDs
    /// in key order (UUIDv7 suffixes come back chronological)
    fn scan_suffix_ids(&self, namespace: &[u8], prefix_id: Uuid) -> Result<Vec<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let prefix = Self::index_key(namespace, prefix_id);

        let mut ids = Vec::new();
        for item in self.db.prefix_iterator_cf(&cf, &prefix) {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            ids.push(Self::uuid_from_bytes(&key[prefix.len()..])?);
        }
        Ok(ids)
    }

    fn uuid_from_bytes(bytes: &[u8]) -> Result<Uuid> {
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| Error::Storage("Malformed index entry".to_string()))?;
        Ok(Uuid::from_bytes(arr))
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_wallets: self.approximate_count(CF_WALLETS)?,
            total_transactions: self.approximate_count(CF_TRANSACTIONS)?,
            total_payouts: self.approximate_count(CF_PAYOUTS)?,
            total_payments: self.approximate_count(CF_PAYMENTS)?,
        })
    }

    fn approximate_count(&self, cf_name: &str) -> Result<u64> {
        let cf = self.cf_handle(cf_name)?;
        let prop = self
            .db
            .property_int_value_cf(&cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);
        Ok(prop)
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate wallet count
    pub total_wallets: u64,
    /// Approximate transaction count
    pub total_transactions: u64,
    /// Approximate payout count
    pub total_payouts: u64,
    /// Approximate payment count
    pub total_payments: u64,
}
