//! Deterministic fork scenario over a shared block tree.

use std::collections::BTreeMap;

use anyhow::Result;
use arbor_core::chain::BlockChain;
use arbor_core::crypto::{sign_all_inputs, KeyPair};
use arbor_core::error::BlockRejection;
use arbor_core::producer::BlockProducer;
use arbor_core::shared::SharedChain;
use arbor_core::traits::Ed25519Verifier;
use arbor_core::types::{Block, Hash256, Transaction, TxOutput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::SimConfig;

/// Counters reported at the end of a run.
#[derive(Debug, Default)]
pub struct Summary {
    pub produced: u64,
    pub forks_accepted: u64,
    pub duplicates: u64,
    pub payments_staged: u64,
    pub rejected: BTreeMap<&'static str, u64>,
    pub best_height: u64,
    pub retained: usize,
    pub min_height: u64,
    pub utxos: usize,
}

struct Miner {
    keys: KeyPair,
    producer: BlockProducer,
}

pub struct Simulation {
    chain: SharedChain,
    miners: Vec<Miner>,
    rng: StdRng,
    config: SimConfig,
}

fn rejection_kind(reason: &BlockRejection) -> &'static str {
    match reason {
        BlockRejection::MissingParentHash => "missing_parent_hash",
        BlockRejection::UnknownParent(_) => "unknown_parent",
        BlockRejection::InvalidTransactions { .. } => "invalid_transactions",
        BlockRejection::StaleHeight { .. } => "stale_height",
        BlockRejection::Coinbase(_) => "coinbase",
    }
}

impl Simulation {
    /// Generate producer keys from the seed and start a tree whose genesis pays the first one.
    pub fn new(config: SimConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let miners: Vec<Miner> = (0..config.miners)
            .map(|_| {
                let mut secret = [0u8; 32];
                rng.fill(&mut secret);
                let keys = KeyPair::from_secret_bytes(secret);
                let producer = BlockProducer::new(keys.pubkey_hash());
                Miner { keys, producer }
            })
            .collect();

        let first = miners
            .first()
            .map(|m| m.keys.pubkey_hash())
            .unwrap_or(Hash256::ZERO);
        let genesis = Block::new(
            None,
            Transaction::coinbase(config.chain.coinbase_reward, first, 1),
            vec![],
            0,
        )?;
        let chain = BlockChain::with_config(genesis, config.chain, Ed25519Verifier)?;

        Ok(Self {
            chain: SharedChain::new(chain),
            miners,
            rng,
            config,
        })
    }

    pub fn run(mut self) -> Result<Summary> {
        let mut summary = Summary::default();
        for step in 1..=self.config.blocks {
            let miner = self.rng.gen_range(0..self.miners.len());
            if self.rng.gen_bool(self.config.fork_rate) {
                self.fork(miner, step, &mut summary)?;
            } else {
                for _ in 0..self.config.payments_per_block {
                    if self.stage_payment()? {
                        summary.payments_staged += 1;
                    }
                }
                let producer = &self.miners[miner].producer;
                if self.chain.produce_block(producer, step).is_some() {
                    summary.produced += 1;
                }
            }
        }

        self.chain.with_chain(|chain| {
            summary.best_height = chain.max_height();
            summary.retained = chain.len();
            summary.min_height = chain.min_height();
            summary.utxos = chain.max_height_utxo_pool().len();
        });
        Ok(summary)
    }

    /// Extend a random retained node with a coinbase-only block.
    fn fork(&mut self, miner: usize, step: u64, summary: &mut Summary) -> Result<()> {
        let retained: Vec<(Hash256, u64)> = self
            .chain
            .with_chain(|chain| chain.nodes().map(|n| (n.hash(), n.height())).collect());
        let (parent, height) = retained[self.rng.gen_range(0..retained.len())];

        let reward_to = self.miners[miner].keys.pubkey_hash();
        let coinbase = Transaction::coinbase(self.config.chain.coinbase_reward, reward_to, height + 1);
        let block = Block::new(Some(parent), coinbase, vec![], step)?;

        match self.chain.try_add_block(block) {
            Ok(admission) if admission.already_known => summary.duplicates += 1,
            Ok(admission) => {
                summary.forks_accepted += 1;
                debug!(height = admission.height, new_best = admission.new_best, "fork block admitted");
            }
            Err(reason) => *summary.rejected.entry(rejection_kind(&reason)).or_default() += 1,
        }
        Ok(())
    }

    /// Stage a signed payment from a random miner's best-tip output to another miner.
    ///
    /// Returns false if the chosen miner owns no spendable value yet.
    fn stage_payment(&mut self) -> Result<bool> {
        let payer = self.rng.gen_range(0..self.miners.len());
        let payee = self.rng.gen_range(0..self.miners.len());
        let pool = self.chain.max_height_utxo_pool();
        let owned: Vec<_> = pool
            .owned_by(&self.miners[payer].keys.pubkey_hash())
            .into_iter()
            .filter(|(_, output)| output.value > 0)
            .collect();
        if owned.is_empty() {
            return Ok(false);
        }
        let (outpoint, output) = &owned[self.rng.gen_range(0..owned.len())];

        let amount = self.rng.gen_range(1..=output.value);
        let mut outputs = vec![TxOutput {
            value: amount,
            pubkey_hash: self.miners[payee].keys.pubkey_hash(),
        }];
        if amount < output.value {
            outputs.push(TxOutput {
                value: output.value - amount,
                pubkey_hash: output.pubkey_hash,
            });
        }
        let mut tx = Transaction::new(vec![outpoint.clone()], outputs);
        sign_all_inputs(&mut tx, &self.miners[payer].keys)?;
        self.chain.stage_transaction(tx)?;
        Ok(true)
    }
}

impl Summary {
    pub fn log(&self) {
        info!(
            best_height = self.best_height,
            retained = self.retained,
            min_height = self.min_height,
            utxos = self.utxos,
            "final block tree"
        );
        info!(
            produced = self.produced,
            forks_accepted = self.forks_accepted,
            duplicates = self.duplicates,
            payments_staged = self.payments_staged,
            "submissions"
        );
        for (kind, count) in &self.rejected {
            info!(kind, count, "rejections");
        }
    }
}
