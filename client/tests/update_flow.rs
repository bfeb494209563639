//! End-to-end assembly of consensus rounds into submission instructions.
//!
//! No network involved: gateway responses are constructed directly and
//! pushed through the merge + assembly pipeline, the way they arrive from
//! `fetch_signatures_consensus`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rust_decimal_macros::dec;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::secp256k1_program;

use quorum_accounts::{FeedAccountData, OracleAccountData, SlotHash};
use quorum_client::{
    merge_consensus, ClientError, ConsensusOracleResponse, FeedEvalResponse,
    FeedUpdateAssembler, FetchSignaturesConsensusResponse, SIGNATURE_BLOCK_SIZE,
    SIGNATURE_OFFSETS_SERIALIZED_SIZE, SUBMIT_CONSENSUS_DISCRIMINATOR,
};

const SCALE: i128 = 1_000_000_000_000_000_000;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn scaled(value: i64) -> String {
    (value as i128 * SCALE).to_string()
}

fn feed_data(queue: Pubkey, hash_fill: u8, min_responses: u32) -> FeedAccountData {
    FeedAccountData {
        queue,
        feed_hash: [hash_fill; 32],
        name: [0u8; 32],
        max_variance: 1_000_000_000,
        min_responses,
        min_sample_size: 3,
        lut_slot: 0,
    }
}

fn eval(oracle: &Pubkey, hash_fill: u8, value: &str, error: &str) -> FeedEvalResponse {
    FeedEvalResponse {
        oracle_pubkey: hex::encode(oracle.as_ref()),
        queue_pubkey: hex::encode([0u8; 32]),
        feed_hash: hex::encode([hash_fill; 32]),
        recent_hash: String::new(),
        success_value: value.to_string(),
        failure_error: error.to_string(),
        msg: String::new(),
        signature: BASE64.encode([7u8; 64]),
        recovery_id: 0,
        timestamp: None,
    }
}

fn oracle_entry(evals: Vec<FeedEvalResponse>, checksum: &[u8]) -> ConsensusOracleResponse {
    ConsensusOracleResponse {
        feed_responses: evals,
        eth_address: hex::encode([3u8; 20]),
        checksum: BASE64.encode(checksum),
        signature: BASE64.encode([7u8; 64]),
        recovery_id: 1,
    }
}

fn anchor() -> SlotHash {
    SlotHash {
        slot: 1234,
        hash: [8u8; 32],
    }
}

/// Five oracles, three of which return values and two of which error:
/// the round succeeds with the median of the three values, and the two
/// failure strings are preserved.
#[test]
fn mixed_successes_reach_consensus() {
    init_logs();
    let queue = Pubkey::new_unique();
    let feed = Pubkey::new_unique();
    let datas = vec![feed_data(queue, 1, 2)];

    let oracles: Vec<Pubkey> = (0..5).map(|_| Pubkey::new_unique()).collect();
    let checksum = [5u8; 32];
    let response = FetchSignaturesConsensusResponse {
        median_responses: vec![],
        oracle_responses: vec![
            oracle_entry(vec![eval(&oracles[0], 1, &scaled(100), "")], &checksum),
            oracle_entry(vec![eval(&oracles[1], 1, &scaled(102), "")], &checksum),
            oracle_entry(vec![eval(&oracles[2], 1, &scaled(101), "")], &checksum),
            oracle_entry(
                vec![eval(&oracles[3], 1, "", "FetchError: connection refused")],
                &checksum,
            ),
            oracle_entry(vec![eval(&oracles[4], 1, "", "JobError: timeout")], &checksum),
        ],
    };

    let round = merge_consensus(queue, anchor(), &[feed], &datas, &response).unwrap();

    assert_eq!(round.num_successes, 1);
    assert_eq!(round.feeds[0].value, Some(dec!(101)));
    assert_eq!(round.feeds[0].raw_value, Some(101 * SCALE));
    assert_eq!(round.feeds[0].num_responses, 3);
    assert_eq!(round.feeds[0].failures.len(), 2);
    assert_eq!(round.median_values, vec![101 * SCALE]);
    assert_eq!(round.slot, 1234);
}

/// A feed whose every response errors fails on its own, with all error
/// strings preserved, while a sibling feed in the same batch still reaches
/// consensus normally.
#[test]
fn all_error_feed_fails_without_aborting_sibling() {
    init_logs();
    let queue = Pubkey::new_unique();
    let dead_feed = Pubkey::new_unique();
    let live_feed = Pubkey::new_unique();
    let datas = vec![feed_data(queue, 1, 1), feed_data(queue, 2, 1)];

    let oracles: Vec<Pubkey> = (0..2).map(|_| Pubkey::new_unique()).collect();
    let checksum = [5u8; 32];
    let response = FetchSignaturesConsensusResponse {
        median_responses: vec![],
        oracle_responses: vec![
            oracle_entry(
                vec![
                    eval(&oracles[0], 1, "", "JobError: parse failure"),
                    eval(&oracles[0], 2, &scaled(7), ""),
                ],
                &checksum,
            ),
            oracle_entry(
                vec![
                    eval(&oracles[1], 1, "", "JobError: upstream 500"),
                    eval(&oracles[1], 2, &scaled(9), ""),
                ],
                &checksum,
            ),
        ],
    };

    let round =
        merge_consensus(queue, anchor(), &[dead_feed, live_feed], &datas, &response).unwrap();

    assert_eq!(round.num_successes, 1);

    let dead = &round.feeds[0];
    assert!(dead.value.is_none());
    assert_eq!(dead.num_responses, 0);
    assert_eq!(dead.failures.len(), 2);
    assert!(dead.failures.iter().any(|f| f.contains("parse failure")));
    assert!(dead.failures.iter().any(|f| f.contains("upstream 500")));
    assert_eq!(round.median_values[0], i128::MAX);

    // even count: upper of the two middle values, never an average
    let live = &round.feeds[1];
    assert_eq!(live.value, Some(dec!(9)));
    assert_eq!(round.median_values[1], 9 * SCALE);
}

/// The assembled pair is `[verify, submit]`: the verification instruction
/// targets the secp256k1 program and carries every signature over one
/// shared message; the submission follows with the median values.
#[test]
fn assembled_pair_is_verify_then_submit() {
    init_logs();
    let queue = Pubkey::new_unique();
    let feed = Pubkey::new_unique();
    let payer = Pubkey::new_unique();
    let datas = vec![feed_data(queue, 1, 1)];

    let oracles: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();
    let checksum = [5u8; 32];
    let response = FetchSignaturesConsensusResponse {
        median_responses: vec![],
        oracle_responses: oracles
            .iter()
            .enumerate()
            .map(|(i, oracle)| {
                oracle_entry(
                    vec![eval(oracle, 1, &scaled(100 + i as i64), "")],
                    &checksum,
                )
            })
            .collect(),
    };
    let round = merge_consensus(queue, anchor(), &[feed], &datas, &response).unwrap();

    let assembler = FeedUpdateAssembler::default();
    let instructions = assembler.assemble_consensus(&round, &[feed], &payer).unwrap();
    assert_eq!(instructions.len(), 2);

    let verify = &instructions[0];
    assert_eq!(verify.program_id, secp256k1_program::ID);
    assert_eq!(verify.data[0], 3);
    assert_eq!(
        verify.data.len(),
        1 + 3 * SIGNATURE_OFFSETS_SERIALIZED_SIZE + 3 * SIGNATURE_BLOCK_SIZE + checksum.len()
    );

    let submit = &instructions[1];
    assert_eq!(&submit.data[..8], &SUBMIT_CONSENSUS_DISCRIMINATOR);
    assert_eq!(&submit.data[8..16], &1234u64.to_le_bytes());
    assert_eq!(&submit.data[20..36], &(101 * SCALE).to_le_bytes());

    // feed account is writable and precedes the oracle set
    let feed_meta = submit
        .accounts
        .iter()
        .position(|meta| meta.pubkey == feed)
        .unwrap();
    assert!(submit.accounts[feed_meta].is_writable);
    for oracle in &oracles {
        let oracle_meta = submit
            .accounts
            .iter()
            .position(|meta| meta.pubkey == *oracle)
            .unwrap();
        assert!(feed_meta < oracle_meta);
        assert!(!submit.accounts[oracle_meta].is_writable);

        let stats_meta = submit
            .accounts
            .iter()
            .position(|meta| meta.pubkey == OracleAccountData::stats_key(oracle))
            .unwrap();
        assert!(oracle_meta < stats_meta);
        assert!(submit.accounts[stats_meta].is_writable);
    }
}

/// Oracles that signed different checksums cannot be folded into one
/// verification instruction; assembly fails rather than attesting to a
/// payload nobody signed.
#[test]
fn mismatched_checksums_abort_assembly() {
    init_logs();
    let queue = Pubkey::new_unique();
    let feed = Pubkey::new_unique();
    let payer = Pubkey::new_unique();
    let datas = vec![feed_data(queue, 1, 1)];

    let oracle_a = Pubkey::new_unique();
    let oracle_b = Pubkey::new_unique();
    let response = FetchSignaturesConsensusResponse {
        median_responses: vec![],
        oracle_responses: vec![
            oracle_entry(vec![eval(&oracle_a, 1, &scaled(5), "")], &[5u8; 32]),
            oracle_entry(vec![eval(&oracle_b, 1, &scaled(5), "")], &[6u8; 32]),
        ],
    };
    let round = merge_consensus(queue, anchor(), &[feed], &datas, &response).unwrap();

    let err = FeedUpdateAssembler::default()
        .assemble_consensus(&round, &[feed], &payer)
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::SignatureMessageMismatch { index: 1, .. }
    ));
}
