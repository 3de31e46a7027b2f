use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, SqliteConnection,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{Address, HouseId, HouseRecord, Wei};

/// Sqlite-backed persistence of registry state: house records and account
/// balances. All mutations that must be atomic (the buy transfer) run inside
/// a single transaction.
#[derive(Clone)]
pub struct RegistryStore {
    pool: Pool<Sqlite>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS houses (
    house_id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL,
    price TEXT NOT NULL DEFAULT '0',
    listed_at TEXT,
    is_listed INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS accounts (
    address TEXT PRIMARY KEY,
    balance TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_houses_owner ON houses(owner);
CREATE INDEX IF NOT EXISTS idx_houses_listed ON houses(is_listed);
";

impl RegistryStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .context("applying registry schema")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Allocates the next house id and inserts an unlisted record owned by
    /// `owner`. AUTOINCREMENT guarantees the id is never reused, even after
    /// process restarts.
    pub async fn insert_house(&self, owner: Address) -> Result<HouseId> {
        let result = sqlx::query("INSERT INTO houses (owner) VALUES (?1)")
            .bind(owner.to_string())
            .execute(&self.pool)
            .await?;
        let id = result.last_insert_rowid();
        if id <= 0 {
            bail!("sqlite returned a non-positive house rowid: {id}");
        }
        Ok(HouseId(id as u64))
    }

    pub async fn house(&self, house_id: HouseId) -> Result<Option<HouseRecord>> {
        let row = sqlx::query(
            "SELECT house_id, owner, price, listed_at, is_listed FROM houses WHERE house_id = ?1",
        )
        .bind(house_id.0 as i64)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(house_from_row).transpose()
    }

    pub async fn houses_owned_by(&self, owner: Address) -> Result<Vec<HouseRecord>> {
        let rows = sqlx::query(
            "SELECT house_id, owner, price, listed_at, is_listed FROM houses \
             WHERE owner = ?1 ORDER BY house_id",
        )
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(house_from_row).collect()
    }

    pub async fn listed_houses(&self) -> Result<Vec<HouseRecord>> {
        let rows = sqlx::query(
            "SELECT house_id, owner, price, listed_at, is_listed FROM houses \
             WHERE is_listed = 1 ORDER BY house_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(house_from_row).collect()
    }

    pub async fn set_listing(
        &self,
        house_id: HouseId,
        price: Wei,
        listed_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE houses SET price = ?1, listed_at = ?2, is_listed = 1 WHERE house_id = ?3",
        )
        .bind(price.to_string())
        .bind(listed_at)
        .bind(house_id.0 as i64)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            bail!("listing update targeted unknown house {house_id}");
        }
        Ok(())
    }

    /// Balance of `address`; accounts that were never credited read as zero.
    pub async fn balance(&self, address: Address) -> Result<Wei> {
        let mut conn = self.pool.acquire().await?;
        balance_in(&mut conn, address).await
    }

    /// Creates the account with `balance` unless it already exists. Returns
    /// whether a row was inserted. Used for genesis funding, so reboots do
    /// not re-credit existing accounts.
    pub async fn seed_account(&self, address: Address, balance: Wei) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO accounts (address, balance) VALUES (?1, ?2) \
             ON CONFLICT(address) DO NOTHING",
        )
        .bind(address.to_string())
        .bind(balance.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn credit(&self, address: Address, amount: Wei) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        credit_in(&mut tx, address, amount).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Debits `amount`, returning false (and leaving the balance untouched)
    /// when the account cannot cover it.
    pub async fn debit(&self, address: Address, amount: Wei) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let current = balance_in(&mut tx, address).await?;
        let Some(remaining) = current.checked_sub(amount) else {
            return Ok(false);
        };
        set_balance_in(&mut tx, address, remaining).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// The buy transfer: debit the buyer, credit the seller, reassign the
    /// house and clear its listing — one transaction, so a partially applied
    /// purchase can never be observed. Returns false without effect when the
    /// buyer cannot cover `price`.
    pub async fn apply_buy(
        &self,
        house_id: HouseId,
        buyer: Address,
        seller: Address,
        price: Wei,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let buyer_balance = balance_in(&mut tx, buyer).await?;
        let Some(buyer_remaining) = buyer_balance.checked_sub(price) else {
            return Ok(false);
        };
        set_balance_in(&mut tx, buyer, buyer_remaining).await?;
        credit_in(&mut tx, seller, price).await?;

        let result = sqlx::query("UPDATE houses SET owner = ?1, is_listed = 0 WHERE house_id = ?2")
            .bind(buyer.to_string())
            .bind(house_id.0 as i64)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            bail!("buy transfer targeted unknown house {house_id}");
        }

        tx.commit().await?;
        Ok(true)
    }
}

async fn balance_in(conn: &mut SqliteConnection, address: Address) -> Result<Wei> {
    let row = sqlx::query("SELECT balance FROM accounts WHERE address = ?1")
        .bind(address.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => parse_amount(&row.try_get::<String, _>("balance")?),
        None => Ok(Wei::ZERO),
    }
}

async fn set_balance_in(conn: &mut SqliteConnection, address: Address, balance: Wei) -> Result<()> {
    sqlx::query(
        "INSERT INTO accounts (address, balance) VALUES (?1, ?2) \
         ON CONFLICT(address) DO UPDATE SET balance = excluded.balance",
    )
    .bind(address.to_string())
    .bind(balance.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn credit_in(conn: &mut SqliteConnection, address: Address, amount: Wei) -> Result<()> {
    let current = balance_in(conn, address).await?;
    let updated = current
        .checked_add(amount)
        .ok_or_else(|| anyhow!("balance overflow crediting {address}"))?;
    set_balance_in(conn, address, updated).await
}

fn house_from_row(row: &SqliteRow) -> Result<HouseRecord> {
    let house_id: i64 = row.try_get("house_id")?;
    let owner: String = row.try_get("owner")?;
    let price: String = row.try_get("price")?;
    let listed_at: Option<DateTime<Utc>> = row.try_get("listed_at")?;
    let is_listed: bool = row.try_get("is_listed")?;
    Ok(HouseRecord {
        house_id: HouseId(house_id as u64),
        owner: owner
            .parse()
            .map_err(|err| anyhow!("corrupt owner column: {err}"))?,
        price: parse_amount(&price)?,
        listed_at,
        is_listed,
    })
}

fn parse_amount(raw: &str) -> Result<Wei> {
    raw.parse()
        .map_err(|_| anyhow!("corrupt amount column: {raw:?}"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_file_path(database_url) else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }
    }
    Ok(())
}

fn sqlite_file_path(database_url: &str) -> Option<PathBuf> {
    let raw = database_url.strip_prefix("sqlite://").or_else(|| database_url.strip_prefix("sqlite:"))?;
    if raw.is_empty() || raw == ":memory:" || raw.starts_with(':') {
        return None;
    }
    let raw = raw.split('?').next().unwrap_or(raw);
    Some(Path::new(raw).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
