//! Lookup table resolver
//!
//! Queue, oracle and feed accounts each own one address lookup table that
//! compresses the account references of an assembled transaction. Tables
//! are resolved per owning account: requests are deduplicated before any
//! fetch, resolved tables are memoized in the call context, and missing or
//! undecodable tables are filtered out. A lost table costs transaction
//! compactness, never correctness.

use std::collections::HashSet;

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::address_lookup_table::state::AddressLookupTable;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::pubkey::Pubkey;

use quorum_accounts::{lookup_table_key, LutOwner};

use crate::context::ClientContext;
use crate::error::Result;

/// Load the lookup tables owned by `owners` (accounts of kind `T`), keyed
/// by owner. Owners whose account or table is missing are skipped.
async fn load_lookup_tables_keyed<T: LutOwner>(
    rpc: &RpcClient,
    owners: &[Pubkey],
) -> Result<Vec<(Pubkey, AddressLookupTableAccount)>> {
    if owners.is_empty() {
        return Ok(Vec::new());
    }

    // owner accounts carry the slot their table was derived from
    let owner_accounts = rpc.get_multiple_accounts(owners).await?;
    let mut table_keys = Vec::with_capacity(owners.len());
    let mut table_owners = Vec::with_capacity(owners.len());
    for (owner, account) in owners.iter().zip(owner_accounts) {
        let Some(account) = account else {
            log::warn!("lut owner {} has no account, skipping", owner);
            continue;
        };
        match T::decode(&account.data) {
            Ok(data) => {
                table_keys.push(lookup_table_key(owner, data.lut_slot()));
                table_owners.push(*owner);
            }
            Err(err) => log::warn!("lut owner {} failed to decode: {}", owner, err),
        }
    }
    if table_keys.is_empty() {
        return Ok(Vec::new());
    }

    let table_accounts = rpc.get_multiple_accounts(&table_keys).await?;
    let mut tables = Vec::with_capacity(table_keys.len());
    for ((owner, key), account) in table_owners
        .into_iter()
        .zip(table_keys)
        .zip(table_accounts)
    {
        let Some(account) = account else {
            log::warn!("lookup table {} missing, proceeding uncompressed", key);
            continue;
        };
        match AddressLookupTable::deserialize(&account.data) {
            Ok(table) => tables.push((
                owner,
                AddressLookupTableAccount {
                    key,
                    addresses: table.addresses.to_vec(),
                },
            )),
            Err(err) => log::warn!("lookup table {} failed to deserialize: {}", key, err),
        }
    }
    Ok(tables)
}

/// Load the lookup tables owned by `owners`, without caching
pub async fn load_lookup_tables<T: LutOwner>(
    rpc: &RpcClient,
    owners: &[Pubkey],
) -> Result<Vec<AddressLookupTableAccount>> {
    let unique = dedup_keys(owners);
    Ok(load_lookup_tables_keyed::<T>(rpc, &unique)
        .await?
        .into_iter()
        .map(|(_, table)| table)
        .collect())
}

/// Split `keys` into cached tables and deduplicated misses. Every key
/// appears at most once across the two results.
fn partition_cached(
    context: &ClientContext,
    keys: &[Pubkey],
) -> (Vec<AddressLookupTableAccount>, Vec<Pubkey>) {
    let mut hits = Vec::new();
    let mut misses = Vec::new();
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(*key) {
            continue;
        }
        match context.lut_cache.get(key) {
            Some(table) => hits.push(table.clone()),
            None => misses.push(*key),
        }
    }
    (hits, misses)
}

/// Resolve lookup tables for `owners`, consulting and populating the
/// context memo so each distinct owner is fetched exactly once per context
/// lifetime (cache-aside).
pub async fn fetch_and_cache_luts<T: LutOwner>(
    rpc: &RpcClient,
    context: &ClientContext,
    owners: &[Pubkey],
) -> Result<Vec<AddressLookupTableAccount>> {
    let (mut tables, misses) = partition_cached(context, owners);
    if misses.is_empty() {
        return Ok(tables);
    }

    for (owner, table) in load_lookup_tables_keyed::<T>(rpc, &misses).await? {
        context.lut_cache.insert(owner, table.clone());
        tables.push(table);
    }
    Ok(tables)
}

fn dedup_keys(keys: &[Pubkey]) -> Vec<Pubkey> {
    let mut seen = HashSet::new();
    keys.iter()
        .filter(|key| seen.insert(**key))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(key: Pubkey) -> AddressLookupTableAccount {
        AddressLookupTableAccount {
            key,
            addresses: vec![Pubkey::new_unique()],
        }
    }

    #[test]
    fn test_duplicate_keys_collapse_to_one_miss() {
        let context = ClientContext::new();
        let owner = Pubkey::new_unique();
        let (hits, misses) = partition_cached(&context, &[owner, owner, owner]);
        assert!(hits.is_empty());
        assert_eq!(misses, vec![owner]);
    }

    #[test]
    fn test_cached_keys_are_not_refetched() {
        let context = ClientContext::new();
        let cached = Pubkey::new_unique();
        let missing = Pubkey::new_unique();
        context.lut_cache.insert(cached, table(cached));

        let (hits, misses) = partition_cached(&context, &[cached, missing, cached]);
        assert_eq!(hits.len(), 1);
        assert_eq!(misses, vec![missing]);
    }

    #[test]
    fn test_dedup_preserves_order() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        assert_eq!(dedup_keys(&[a, b, a, b, a]), vec![a, b]);
    }
}
