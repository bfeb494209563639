//! Feed update assembler
//!
//! Turns a completed consensus round into the ordered instruction sequence
//! the ledger accepts: the secp256k1 verification instruction strictly
//! first (the on-chain program checks its preceding sibling), then the
//! submission instruction. Account ordering within the submission is a
//! hard contract with the program: target feeds (writable), then
//! participating oracles (read-only), then their stats PDAs (writable).

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::address_lookup_table::AddressLookupTableAccount;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::{system_program, sysvar};
use std::sync::Arc;

use quorum_accounts::{
    get_associated_token_address, program_state_key, FeedAccountData, OracleAccountData,
    QueueAccountData, NATIVE_MINT, QUORUM_PROGRAM_ID, SPL_TOKEN_PROGRAM_ID,
};

use crate::collector::{
    ConsensusCollector, ConsensusRound, OracleResponse, SignatureCollection,
    FAILED_VALUE_SENTINEL,
};
use crate::context::ClientContext;
use crate::error::{ClientError, Result};
use crate::gateway::FeedRequest;
use crate::lut::fetch_and_cache_luts;
use crate::secp::{build_secp256k1_instruction, Secp256k1Signature};

/// Discriminator of the single-feed submission instruction
pub const SUBMIT_RESPONSE_DISCRIMINATOR: [u8; 8] = [142, 77, 63, 171, 241, 150, 217, 173];

/// Discriminator of the consensus submission instruction
pub const SUBMIT_CONSENSUS_DISCRIMINATOR: [u8; 8] = [73, 170, 128, 59, 38, 243, 245, 7];

/// Ledger target of an assembled update.
///
/// Resolved once at the start of a call; selects the account-derivation
/// strategy for queues and oracles. On SVM side-chains both are mirrored
/// behind program-derived addresses of their mainnet identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetChain {
    #[default]
    Solana,
    Svm,
}

impl TargetChain {
    /// The queue account the submission references
    pub fn queue_key(&self, queue: &Pubkey) -> Pubkey {
        match self {
            TargetChain::Solana => *queue,
            TargetChain::Svm => {
                Pubkey::find_program_address(&[b"Queue", queue.as_ref()], &QUORUM_PROGRAM_ID).0
            }
        }
    }

    /// The oracle account the submission references
    pub fn oracle_key(&self, queue: &Pubkey, oracle: &Pubkey) -> Pubkey {
        match self {
            TargetChain::Solana => *oracle,
            TargetChain::Svm => {
                Pubkey::find_program_address(
                    &[b"Oracle", queue.as_ref(), oracle.as_ref()],
                    &QUORUM_PROGRAM_ID,
                )
                .0
            }
        }
    }
}

/// One oracle's submission record in the single-feed instruction
#[derive(Debug, Clone)]
pub struct Submission {
    /// 1e18-scaled value; the sentinel for failed responses
    pub value: i128,
    pub signature: [u8; 64],
    pub recovery_id: u8,
}

impl Submission {
    pub fn from_response(response: &OracleResponse) -> Self {
        Self {
            value: response.raw_value.unwrap_or(FAILED_VALUE_SENTINEL),
            signature: response.signature,
            recovery_id: response.recovery_id,
        }
    }

    fn encode_into(&self, data: &mut Vec<u8>) {
        data.extend_from_slice(&self.value.to_le_bytes());
        data.extend_from_slice(&self.signature);
        data.push(self.recovery_id);
        // reserved slot-offset byte; always zero for fresh responses
        data.push(0);
    }
}

/// Instruction data of the consensus submission:
/// discriminator, anchor slot, then the per-feed median values
pub fn submit_consensus_data(slot: u64, values: &[i128]) -> Vec<u8> {
    let mut data = Vec::with_capacity(8 + 8 + 4 + values.len() * 16);
    data.extend_from_slice(&SUBMIT_CONSENSUS_DISCRIMINATOR);
    data.extend_from_slice(&slot.to_le_bytes());
    data.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for value in values {
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

/// Instruction data of the single-feed submission:
/// discriminator, anchor slot, then the signed per-oracle submissions
pub fn submit_response_data(slot: u64, submissions: &[Submission]) -> Vec<u8> {
    let mut data = Vec::with_capacity(8 + 8 + 4 + submissions.len() * 82);
    data.extend_from_slice(&SUBMIT_RESPONSE_DISCRIMINATOR);
    data.extend_from_slice(&slot.to_le_bytes());
    data.extend_from_slice(&(submissions.len() as u32).to_le_bytes());
    for submission in submissions {
        submission.encode_into(&mut data);
    }
    data
}

/// Builds submission instructions out of collected attestations
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedUpdateAssembler {
    chain: TargetChain,
}

impl FeedUpdateAssembler {
    pub fn new(chain: TargetChain) -> Self {
        Self { chain }
    }

    /// Accounts every submission variant starts with
    fn static_accounts(&self, queue: &Pubkey, payer: &Pubkey) -> Vec<AccountMeta> {
        let queue_key = self.chain.queue_key(queue);
        vec![
            AccountMeta::new(queue_key, false),
            AccountMeta::new_readonly(program_state_key(), false),
            AccountMeta::new_readonly(sysvar::slot_hashes::ID, false),
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new(
                get_associated_token_address(&queue_key, &NATIVE_MINT),
                false,
            ),
            AccountMeta::new_readonly(SPL_TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(NATIVE_MINT, false),
            AccountMeta::new_readonly(sysvar::instructions::ID, false),
        ]
    }

    /// Oracle and stats metas shared by both submission variants: oracles
    /// read-only first, then their stats PDAs writable.
    fn oracle_accounts(&self, queue: &Pubkey, oracles: &[Pubkey]) -> Vec<AccountMeta> {
        let keys: Vec<Pubkey> = oracles
            .iter()
            .map(|oracle| self.chain.oracle_key(queue, oracle))
            .collect();
        let mut metas: Vec<AccountMeta> = keys
            .iter()
            .map(|key| AccountMeta::new_readonly(*key, false))
            .collect();
        metas.extend(
            keys.iter()
                .map(|key| AccountMeta::new(OracleAccountData::stats_key(key), false)),
        );
        metas
    }

    /// The consensus submission instruction. Account order: static set,
    /// target feeds (writable), oracles (read-only), stats (writable).
    pub fn submit_consensus_ix(
        &self,
        queue: &Pubkey,
        payer: &Pubkey,
        slot: u64,
        values: &[i128],
        feeds: &[Pubkey],
        oracles: &[Pubkey],
    ) -> Instruction {
        let mut accounts = self.static_accounts(queue, payer);
        accounts.extend(feeds.iter().map(|feed| AccountMeta::new(*feed, false)));
        accounts.extend(self.oracle_accounts(queue, oracles));
        Instruction {
            program_id: QUORUM_PROGRAM_ID,
            data: submit_consensus_data(slot, values),
            accounts,
        }
    }

    /// The single-feed submission instruction, signatures embedded
    pub fn submit_response_ix(
        &self,
        feed: &Pubkey,
        queue: &Pubkey,
        payer: &Pubkey,
        slot: u64,
        submissions: &[Submission],
        oracles: &[Pubkey],
    ) -> Instruction {
        let mut accounts = vec![AccountMeta::new(*feed, false)];
        accounts.extend(self.static_accounts(queue, payer));
        accounts.extend(self.oracle_accounts(queue, oracles));
        Instruction {
            program_id: QUORUM_PROGRAM_ID,
            data: submit_response_data(slot, submissions),
            accounts,
        }
    }

    /// Assemble the ready-to-submit `[verify, submit]` pair for a consensus
    /// round. Fails when the round has zero successful feeds, carrying the
    /// per-oracle failure strings.
    pub fn assemble_consensus(
        &self,
        round: &ConsensusRound,
        feeds: &[Pubkey],
        payer: &Pubkey,
    ) -> Result<Vec<Instruction>> {
        if round.num_successes == 0 {
            return Err(ClientError::NoSuccessfulResponses {
                failures: round.all_failures(),
            });
        }

        let signatures: Vec<Secp256k1Signature> = round
            .oracles
            .iter()
            .map(|oracle| Secp256k1Signature {
                eth_address: oracle.eth_address,
                signature: oracle.signature,
                recovery_id: oracle.recovery_id,
                message: oracle.checksum.clone(),
            })
            .collect();
        // the verification instruction sits at index 0 of the transaction
        let verify_ix = build_secp256k1_instruction(&signatures, 0)?;

        let oracle_keys: Vec<Pubkey> = round.oracles.iter().map(|o| o.oracle).collect();
        let submit_ix = self.submit_consensus_ix(
            &round.queue,
            payer,
            round.slot,
            &round.median_values,
            feeds,
            &oracle_keys,
        );
        Ok(vec![verify_ix, submit_ix])
    }

    /// Assemble the single-feed submission instruction. Fails when no
    /// oracle succeeded, carrying the per-oracle failure strings.
    pub fn assemble_single(
        &self,
        feed: &Pubkey,
        queue: &Pubkey,
        payer: &Pubkey,
        collection: &SignatureCollection,
    ) -> Result<Instruction> {
        if collection.num_successes == 0 {
            return Err(ClientError::NoSuccessfulResponses {
                failures: collection.failures.clone(),
            });
        }
        let submissions: Vec<Submission> = collection
            .responses
            .iter()
            .map(Submission::from_response)
            .collect();
        let oracles: Vec<Pubkey> = collection.responses.iter().map(|r| r.oracle).collect();
        Ok(self.submit_response_ix(
            feed,
            queue,
            payer,
            collection.slot,
            &submissions,
            &oracles,
        ))
    }
}

/// Parameters of a consensus feed update
#[derive(Debug, Clone)]
pub struct FetchUpdateParams {
    pub feeds: Vec<Pubkey>,
    pub payer: Pubkey,
    /// Explicit gateway URL; a random healthy one is picked when absent
    pub gateway: Option<String>,
    pub num_signatures: Option<u32>,
    pub chain: TargetChain,
}

/// A ready-to-submit consensus update
#[derive(Debug, Clone)]
pub struct FeedUpdate {
    /// `[verify, submit]`, to be executed in order within one transaction
    pub instructions: Vec<Instruction>,
    pub lookup_tables: Vec<AddressLookupTableAccount>,
    pub round: ConsensusRound,
    pub num_successes: usize,
}

/// Fetch a consensus round across `params.feeds` and assemble the update
/// instruction pair together with its lookup tables.
pub async fn fetch_update_instructions(
    rpc: &RpcClient,
    context: Arc<ClientContext>,
    params: &FetchUpdateParams,
) -> Result<FeedUpdate> {
    let collector = ConsensusCollector::new(rpc, context.clone());
    let round = collector
        .fetch_consensus(
            &params.feeds,
            params.num_signatures,
            params.gateway.as_deref(),
        )
        .await?;

    let assembler = FeedUpdateAssembler::new(params.chain);
    let instructions = assembler.assemble_consensus(&round, &params.feeds, &params.payer)?;

    let oracle_keys: Vec<Pubkey> = round.oracles.iter().map(|o| o.oracle).collect();
    let queue_keys = [round.queue];
    let (oracle_luts, feed_luts, queue_luts) = tokio::join!(
        fetch_and_cache_luts::<OracleAccountData>(rpc, &context, &oracle_keys),
        fetch_and_cache_luts::<FeedAccountData>(rpc, &context, &params.feeds),
        fetch_and_cache_luts::<QueueAccountData>(rpc, &context, &queue_keys),
    );
    let mut lookup_tables = oracle_luts?;
    lookup_tables.extend(feed_luts?);
    lookup_tables.extend(queue_luts?);

    Ok(FeedUpdate {
        instructions,
        lookup_tables,
        num_successes: round.num_successes,
        round,
    })
}

/// Parameters of a single-feed update
#[derive(Debug, Clone)]
pub struct FetchSingleUpdateParams {
    pub feed: Pubkey,
    pub payer: Pubkey,
    pub gateway: Option<String>,
    pub num_signatures: Option<u32>,
    pub chain: TargetChain,
}

/// A ready-to-submit single-feed update
#[derive(Debug, Clone)]
pub struct SingleFeedUpdate {
    pub instruction: Instruction,
    pub lookup_tables: Vec<AddressLookupTableAccount>,
    pub responses: Vec<OracleResponse>,
    pub failures: Vec<String>,
    pub num_successes: usize,
}

/// Fetch attestations for one feed and assemble its submission instruction
pub async fn fetch_single_update_instruction(
    rpc: &RpcClient,
    context: Arc<ClientContext>,
    params: &FetchSingleUpdateParams,
) -> Result<SingleFeedUpdate> {
    let collector = ConsensusCollector::new(rpc, context.clone());
    let feed_data = collector.load_feed(&params.feed).await?;
    let request = FeedRequest {
        encoded_jobs: collector.feed_jobs(&feed_data.feed_hash).await?,
        max_variance: Some(feed_data.max_variance_units()),
        min_responses: Some(feed_data.min_responses),
    };
    let target = params
        .num_signatures
        .unwrap_or_else(|| crate::collector::signature_target(feed_data.min_sample_size));

    let collection = collector
        .fetch_signatures(
            &feed_data.queue,
            &request,
            target,
            params.gateway.as_deref(),
        )
        .await?;

    let assembler = FeedUpdateAssembler::new(params.chain);
    let instruction =
        assembler.assemble_single(&params.feed, &feed_data.queue, &params.payer, &collection)?;

    let oracle_keys: Vec<Pubkey> = collection.responses.iter().map(|r| r.oracle).collect();
    let feed_keys = [params.feed];
    let queue_keys = [feed_data.queue];
    let (oracle_luts, feed_luts, queue_luts) = tokio::join!(
        fetch_and_cache_luts::<OracleAccountData>(rpc, &context, &oracle_keys),
        fetch_and_cache_luts::<FeedAccountData>(rpc, &context, &feed_keys),
        fetch_and_cache_luts::<QueueAccountData>(rpc, &context, &queue_keys),
    );
    let mut lookup_tables = oracle_luts?;
    lookup_tables.extend(feed_luts?);
    lookup_tables.extend(queue_luts?);

    Ok(SingleFeedUpdate {
        instruction,
        lookup_tables,
        num_successes: collection.num_successes,
        failures: collection.failures.clone(),
        responses: collection.responses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consensus_data_layout() {
        let data = submit_consensus_data(42, &[1, -2]);
        assert_eq!(&data[..8], &SUBMIT_CONSENSUS_DISCRIMINATOR);
        assert_eq!(&data[8..16], &42u64.to_le_bytes());
        assert_eq!(&data[16..20], &2u32.to_le_bytes());
        assert_eq!(&data[20..36], &1i128.to_le_bytes());
        assert_eq!(&data[36..52], &(-2i128).to_le_bytes());
        assert_eq!(data.len(), 52);
    }

    #[test]
    fn test_response_data_layout() {
        let submission = Submission {
            value: 7,
            signature: [9u8; 64],
            recovery_id: 1,
        };
        let data = submit_response_data(5, &[submission]);
        assert_eq!(&data[..8], &SUBMIT_RESPONSE_DISCRIMINATOR);
        assert_eq!(&data[8..16], &5u64.to_le_bytes());
        assert_eq!(&data[16..20], &1u32.to_le_bytes());
        assert_eq!(&data[20..36], &7i128.to_le_bytes());
        assert_eq!(&data[36..100], &[9u8; 64]);
        assert_eq!(data[100], 1); // recovery id
        assert_eq!(data[101], 0); // reserved offset byte
        assert_eq!(data.len(), 102);
    }

    #[test]
    fn test_consensus_account_ordering() {
        let assembler = FeedUpdateAssembler::default();
        let queue = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let feeds = [Pubkey::new_unique(), Pubkey::new_unique()];
        let oracles = [Pubkey::new_unique()];
        let ix = assembler.submit_consensus_ix(&queue, &payer, 1, &[10, 20], &feeds, &oracles);

        assert_eq!(ix.program_id, QUORUM_PROGRAM_ID);
        // static set, then feeds (writable), oracles (read-only), stats (writable)
        let base = 9;
        assert_eq!(ix.accounts.len(), base + feeds.len() + 2 * oracles.len());
        assert_eq!(ix.accounts[base].pubkey, feeds[0]);
        assert!(ix.accounts[base].is_writable);
        assert_eq!(ix.accounts[base + 1].pubkey, feeds[1]);
        assert_eq!(ix.accounts[base + 2].pubkey, oracles[0]);
        assert!(!ix.accounts[base + 2].is_writable);
        assert_eq!(
            ix.accounts[base + 3].pubkey,
            OracleAccountData::stats_key(&oracles[0])
        );
        assert!(ix.accounts[base + 3].is_writable);
    }

    #[test]
    fn test_svm_chain_remaps_queue_and_oracle() {
        let queue = Pubkey::new_unique();
        let oracle = Pubkey::new_unique();
        assert_eq!(TargetChain::Solana.queue_key(&queue), queue);
        assert_ne!(TargetChain::Svm.queue_key(&queue), queue);
        assert_ne!(
            TargetChain::Svm.oracle_key(&queue, &oracle),
            TargetChain::Solana.oracle_key(&queue, &oracle)
        );
    }

    #[test]
    fn test_single_update_with_zero_successes_is_an_error() {
        let assembler = FeedUpdateAssembler::default();
        let collection = SignatureCollection {
            responses: vec![],
            failures: vec!["oracle x: unreachable".into()],
            num_successes: 0,
            attempts: 3,
            slot: 9,
        };
        let err = assembler
            .assemble_single(
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                &Pubkey::new_unique(),
                &collection,
            )
            .unwrap_err();
        match err {
            ClientError::NoSuccessfulResponses { failures } => {
                assert_eq!(failures.len(), 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
