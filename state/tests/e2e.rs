//! End-to-end tests for the wallet state.
//!
//! Every test builds a fresh [`Wallet`] over in-memory services and drives
//! it only through its public operations and selectors: scope creation on
//! first fetch, status transitions, the dedup gate, partial batch failures,
//! cancellation, and the derived token view.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use nova_state::config::{DedupPolicy, StoreConfig};
use nova_state::ports::{ExplorerService, FungibleTokenService, ServiceError, TransactionDetails};
use nova_state::selectors::select_scope;
use nova_state::slices::tokens_metadata::{select_one_contract_metadata, ContractMetadata};
use nova_state::slices::transactions::{Transaction, TransactionStatus};
use nova_state::{RunOutcome, ScopeKey, Wallet};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// In-memory token service with call counters and failure injection.
#[derive(Default)]
struct MockTokens {
    likely: HashMap<String, Vec<String>>,
    balances: HashMap<(String, String), String>,
    metadata: HashMap<String, ContractMetadata>,
    failing_balances: HashSet<String>,
    delay: Duration,
    discovery_delay: Duration,
    balance_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
}

impl MockTokens {
    fn likely(mut self, account: &str, contracts: &[&str]) -> Self {
        self.likely.insert(
            account.to_string(),
            contracts.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    fn balance(mut self, account: &str, contract: &str, balance: &str) -> Self {
        self.balances
            .insert((contract.to_string(), account.to_string()), balance.to_string());
        self
    }

    fn token(mut self, contract: &str, name: &str) -> Self {
        self.metadata.insert(contract.to_string(), metadata(contract, name));
        self
    }

    fn failing_balance(mut self, contract: &str) -> Self {
        self.failing_balances.insert(contract.to_string());
        self
    }

    fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    fn discovery_delay_ms(mut self, ms: u64) -> Self {
        self.discovery_delay = Duration::from_millis(ms);
        self
    }
}

#[async_trait]
impl FungibleTokenService for MockTokens {
    async fn likely_token_contracts(&self, account_id: &str) -> Result<Vec<String>, ServiceError> {
        tokio::time::sleep(self.discovery_delay).await;
        Ok(self.likely.get(account_id).cloned().unwrap_or_default())
    }

    async fn balance_of(
        &self,
        contract_name: &str,
        account_id: &str,
    ) -> Result<String, ServiceError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.failing_balances.contains(contract_name) {
            return Err(ServiceError::Unavailable(format!("{contract_name} rpc down")));
        }
        Ok(self
            .balances
            .get(&(contract_name.to_string(), account_id.to_string()))
            .cloned()
            .unwrap_or_else(|| "0".to_string()))
    }

    async fn contract_metadata(
        &self,
        contract_name: &str,
    ) -> Result<ContractMetadata, ServiceError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.metadata
            .get(contract_name)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(contract_name.to_string()))
    }
}

/// In-memory explorer. Transactions listed per account; statuses per hash.
#[derive(Default)]
struct MockExplorer {
    transactions: parking_lot::Mutex<HashMap<String, Vec<Transaction>>>,
    statuses: HashMap<String, String>,
    delay: Duration,
    list_calls: AtomicUsize,
}

impl MockExplorer {
    fn with(self, account: &str, txs: Vec<Transaction>) -> Self {
        self.transactions.lock().insert(account.to_string(), txs);
        self
    }

    fn status(mut self, hash: &str, status: &str) -> Self {
        self.statuses.insert(hash.to_string(), status.to_string());
        self
    }

    fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

#[async_trait]
impl ExplorerService for MockExplorer {
    async fn transactions(&self, account_id: &str) -> Result<Vec<Transaction>, ServiceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self
            .transactions
            .lock()
            .get(account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn transaction_extra_info(
        &self,
        hash: &str,
        _signer_id: &str,
    ) -> Result<TransactionDetails, ServiceError> {
        self.statuses
            .get(hash)
            .map(|status| TransactionDetails {
                status: status.clone(),
            })
            .ok_or_else(|| ServiceError::Unavailable("explorer down".into()))
    }
}

fn metadata(contract: &str, name: &str) -> ContractMetadata {
    ContractMetadata {
        contract_name: contract.to_string(),
        spec: "ft-1.0.0".to_string(),
        name: name.to_string(),
        symbol: name.to_uppercase(),
        decimals: 18,
        icon: None,
    }
}

fn tx(hash: &str, timestamp: u64) -> Transaction {
    Transaction {
        hash: hash.to_string(),
        hash_with_index: format!("{hash}:0"),
        signer_id: "alice.near".to_string(),
        receiver_id: Some("bob.near".to_string()),
        action_kind: Some("TRANSFER".to_string()),
        block_hash: None,
        block_timestamp: timestamp,
        status: None,
        check_status: false,
    }
}

fn no_whitelist() -> StoreConfig {
    StoreConfig {
        whitelisted_contracts: Vec::new(),
        ..StoreConfig::default()
    }
}

fn wallet(
    tokens: MockTokens,
    explorer: MockExplorer,
) -> (Wallet, Arc<MockTokens>, Arc<MockExplorer>) {
    wallet_with(no_whitelist(), tokens, explorer)
}

fn wallet_with(
    config: StoreConfig,
    tokens: MockTokens,
    explorer: MockExplorer,
) -> (Wallet, Arc<MockTokens>, Arc<MockExplorer>) {
    let tokens = Arc::new(tokens);
    let explorer = Arc::new(explorer);
    let wallet = Wallet::new(config, tokens.clone(), explorer.clone());
    (wallet, tokens, explorer)
}

fn alice() -> ScopeKey {
    ScopeKey::from("alice.near")
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[tokio::test]
async fn balance_fetch_end_to_end() {
    let (wallet, _, _) = wallet(
        MockTokens::default().balance("alice.near", "usn", "100"),
        MockExplorer::default(),
    );

    let outcome = wallet.fetch_owned_tokens_for_contract(&alice(), "usn").await;

    assert_eq!(outcome, RunOutcome::Completed("100".to_string()));
    let token = wallet.token(&alice(), "usn");
    assert_eq!(token.balance, "100");
    assert!(token.status.success);
    assert!(!token.status.loading);
    assert!(!wallet.tokens_loading(&alice()));
}

#[tokio::test]
async fn duplicate_balance_fetch_starts_one_task() {
    let (wallet, tokens, _) = wallet(
        MockTokens::default()
            .balance("alice.near", "usn", "100")
            .delay_ms(20),
        MockExplorer::default(),
    );

    let alice = alice();
    let (a, b) = tokio::join!(
        wallet.fetch_owned_tokens_for_contract(&alice, "usn"),
        wallet.fetch_owned_tokens_for_contract(&alice, "usn"),
    );

    assert_eq!(tokens.balance_calls.load(Ordering::SeqCst), 1);
    assert!(a.is_completed());
    assert!(b.is_suppressed());
    assert_eq!(wallet.store().in_flight(), 0);
}

#[tokio::test]
async fn soft_policy_still_honours_loading_condition() {
    let config = StoreConfig {
        dedup: DedupPolicy::Soft,
        ..no_whitelist()
    };
    let (wallet, tokens, _) = wallet_with(
        config,
        MockTokens::default().delay_ms(20),
        MockExplorer::default(),
    );

    let alice = alice();
    let (a, b) = tokio::join!(
        wallet.fetch_owned_tokens_for_contract(&alice, "usn"),
        wallet.fetch_owned_tokens_for_contract(&alice, "usn"),
    );

    assert!(a.is_completed());
    assert!(b.is_suppressed());
    assert_eq!(tokens.balance_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fetch_tokens_tolerates_one_failing_contract() {
    // B has no metadata, so its load fails before the balance fetch.
    let (wallet, tokens, _) = wallet(
        MockTokens::default()
            .likely("alice.near", &["a.near", "b.near", "c.near"])
            .token("a.near", "Alpha")
            .token("c.near", "Charlie")
            .balance("alice.near", "a.near", "5")
            .balance("alice.near", "c.near", "7"),
        MockExplorer::default(),
    );

    let outcome = wallet.fetch_tokens(&alice()).await;

    assert_eq!(
        outcome,
        RunOutcome::Completed(vec!["a.near".to_string(), "c.near".to_string()])
    );
    assert_eq!(tokens.balance_calls.load(Ordering::SeqCst), 2);
    assert_eq!(wallet.token(&alice(), "a.near").balance, "5");
    assert_eq!(wallet.token(&alice(), "c.near").balance, "7");
    assert_eq!(wallet.token(&alice(), "b.near").balance, "");

    let entry = wallet
        .store()
        .read(|s| select_scope(&s.tokens.by_account_id, &alice()).into_owned());
    assert!(entry.status.success);
    assert!(!entry.status.error);
    assert_eq!(
        entry.domain.likely_contracts,
        vec!["a.near", "b.near", "c.near"]
    );
}

#[tokio::test]
async fn failing_balance_is_recorded_on_its_contract_only() {
    let (wallet, _, _) = wallet(
        MockTokens::default()
            .likely("alice.near", &["a.near", "b.near"])
            .token("a.near", "Alpha")
            .token("b.near", "Bravo")
            .balance("alice.near", "a.near", "5")
            .failing_balance("b.near"),
        MockExplorer::default(),
    );

    let loaded = wallet.fetch_tokens(&alice()).await.completed().unwrap();

    assert_eq!(loaded, vec!["a.near".to_string()]);
    let b = wallet.token(&alice(), "b.near");
    assert!(b.status.error);
    assert_eq!(b.status.error_code.as_deref(), Some("UNAVAILABLE"));
    assert!(wallet.token(&alice(), "a.near").status.success);
}

#[tokio::test]
async fn whitelist_is_queried_after_likely_contracts() {
    let config = StoreConfig {
        whitelisted_contracts: vec!["usn".to_string(), "a.near".to_string()],
        ..StoreConfig::default()
    };
    let (wallet, _, _) = wallet_with(
        config,
        MockTokens::default()
            .likely("alice.near", &["a.near"])
            .token("a.near", "Alpha")
            .token("usn", "USN"),
        MockExplorer::default(),
    );

    let loaded = wallet.fetch_tokens(&alice()).await.completed().unwrap();
    assert_eq!(loaded, vec!["a.near".to_string(), "usn".to_string()]);
}

#[tokio::test]
async fn tokens_with_metadata_skips_zero_and_sorts_by_name() {
    let (wallet, _, _) = wallet(
        MockTokens::default()
            .likely("alice.near", &["z.near", "a.near", "empty.near"])
            .token("z.near", "Alpha")
            .token("a.near", "Zulu")
            .token("empty.near", "Empty")
            .balance("alice.near", "z.near", "1")
            .balance("alice.near", "a.near", "2"),
        MockExplorer::default(),
    );
    wallet.fetch_tokens(&alice()).await;

    let view = wallet.tokens_with_metadata(&alice());
    let names: Vec<_> = view
        .iter()
        .map(|t| t.on_chain_ft_metadata.as_ref().unwrap().name.as_str())
        .collect();
    assert_eq!(names, vec!["Alpha", "Zulu"]);

    // Nothing changed: same Arc.
    assert!(Arc::ptr_eq(&view, &wallet.tokens_with_metadata(&alice())));
}

#[tokio::test]
async fn fetch_token_without_account_only_records_metadata() {
    let (wallet, tokens, _) = wallet(
        MockTokens::default().token("usn", "USN"),
        MockExplorer::default(),
    );

    assert!(wallet.fetch_token("usn", None).await);
    assert!(!wallet.fetch_token("missing.near", None).await);

    assert!(wallet
        .store()
        .read(|s| select_one_contract_metadata(s, "usn"))
        .is_some());
    assert!(wallet.store().read(|s| s.tokens.by_account_id.is_empty()));
    assert_eq!(tokens.balance_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn metadata_is_fetched_once_across_accounts() {
    let (wallet, tokens, _) = wallet(
        MockTokens::default()
            .likely("alice.near", &["usn"])
            .likely("bob.near", &["usn"])
            .token("usn", "USN"),
        MockExplorer::default(),
    );

    wallet.fetch_tokens(&alice()).await;
    wallet.fetch_tokens(&ScopeKey::from("bob.near")).await;

    assert_eq!(tokens.metadata_calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transactions_first_load_then_update() {
    let (wallet, _, explorer) = wallet(
        MockTokens::default(),
        MockExplorer::default()
            .with("alice.near", vec![tx("a", 10), tx("b", 30), tx("c", 20)]),
    );

    assert_eq!(wallet.fetch_transactions(&alice()).await, RunOutcome::Completed(3));
    let stamps: Vec<u64> = wallet
        .transactions(&alice())
        .iter()
        .map(|t| t.block_timestamp)
        .collect();
    assert_eq!(stamps, vec![30, 20, 10]);

    explorer
        .transactions
        .lock()
        .insert("alice.near".to_string(), vec![tx("d", 25)]);
    wallet.fetch_transactions(&alice()).await;

    let stamps: Vec<u64> = wallet
        .transactions(&alice())
        .iter()
        .map(|t| t.block_timestamp)
        .collect();
    assert_eq!(stamps, vec![30, 25, 20, 10]);
    assert!(!wallet.transactions_loading(&alice()));
}

#[tokio::test]
async fn transaction_status_poll_and_unavailable_sentinel() {
    let (wallet, _, _) = wallet(
        MockTokens::default(),
        MockExplorer::default()
            .with("alice.near", vec![tx("a", 10), tx("b", 20)])
            .status("a", "SuccessValue"),
    );
    wallet.fetch_transactions(&alice()).await;
    let listed = wallet.transactions(&alice());
    let b = listed.iter().find(|t| t.hash == "b").unwrap().clone();
    let a = listed.iter().find(|t| t.hash == "a").unwrap().clone();

    let a_status = wallet.fetch_transaction_status(&alice(), &a).await;
    let b_status = wallet.fetch_transaction_status(&alice(), &b).await;

    assert_eq!(a_status, RunOutcome::Completed(TransactionStatus::SuccessValue));
    assert_eq!(b_status, RunOutcome::Completed(TransactionStatus::NotAvailable));

    let after = wallet.transactions(&alice());
    let a = after.iter().find(|t| t.hash == "a").unwrap();
    let b = after.iter().find(|t| t.hash == "b").unwrap();
    assert!(a.check_status);
    assert!(!b.check_status);
    assert_eq!(b.status, Some(TransactionStatus::NotAvailable));
}

#[tokio::test]
async fn cancelled_fetch_discards_result_and_returns_to_idle() {
    let (wallet, _, _) = wallet(
        MockTokens::default(),
        MockExplorer::default()
            .with("alice.near", vec![tx("a", 10)])
            .delay_ms(40),
    );

    let alice = alice();
    let cancel = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        wallet.cancel(&alice)
    };
    let (outcome, cancelled) = tokio::join!(wallet.fetch_transactions(&alice), cancel);

    assert_eq!(cancelled, 1);
    assert_eq!(outcome, RunOutcome::Cancelled);
    assert!(wallet.transactions(&alice).is_empty());
    let entry = wallet
        .store()
        .read(|s| select_scope(&s.transactions.by_account_id, &alice).into_owned());
    assert!(entry.status.is_idle());

    // The claim is gone: the next fetch runs.
    assert!(wallet.fetch_transactions(&alice).await.is_completed());
    assert_eq!(wallet.transactions(&alice).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_discovery_leaves_no_balances() {
    let (wallet, tokens, _) = wallet(
        MockTokens::default()
            .likely("alice.near", &["usn"])
            .token("usn", "USN")
            .balance("alice.near", "usn", "100")
            .discovery_delay_ms(30),
        MockExplorer::default(),
    );
    let alice = alice();

    let cancel = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        wallet.cancel(&alice)
    };
    let (outcome, cancelled) = tokio::join!(wallet.fetch_tokens(&alice), cancel);

    assert_eq!(cancelled, 1);
    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(tokens.balance_calls.load(Ordering::SeqCst), 0);
    let usn = wallet.token(&alice, "usn");
    assert_eq!(usn.balance, "");
    assert!(usn.status.is_idle());
    assert!(!wallet.tokens_loading(&alice));
}

#[tokio::test(start_paused = true)]
async fn cancel_during_batch_discards_nested_balances() {
    let (wallet, tokens, _) = wallet(
        MockTokens::default()
            .likely("alice.near", &["a.near", "b.near"])
            .token("a.near", "Alpha")
            .token("b.near", "Bravo")
            .balance("alice.near", "a.near", "5")
            .balance("alice.near", "b.near", "7")
            .delay_ms(30),
        MockExplorer::default(),
    );
    let alice = alice();

    let cancel = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        wallet.cancel(&alice)
    };
    let (outcome, cancelled) = tokio::join!(wallet.fetch_tokens(&alice), cancel);

    // The discovery run and both balance runs were live.
    assert_eq!(cancelled, 3);
    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(tokens.balance_calls.load(Ordering::SeqCst), 2);
    assert_eq!(wallet.token(&alice, "a.near").balance, "");
    assert_eq!(wallet.token(&alice, "b.near").balance, "");
    assert!(!wallet.tokens_loading(&alice));
    assert_eq!(wallet.store().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn timed_out_fetch_does_not_wedge_the_account() {
    let (wallet, _, explorer) = wallet(
        MockTokens::default(),
        MockExplorer::default()
            .with("alice.near", vec![tx("a", 10)])
            .delay_ms(50),
    );
    let alice = alice();

    let timed_out =
        tokio::time::timeout(Duration::from_millis(5), wallet.fetch_transactions(&alice)).await;

    assert!(timed_out.is_err());
    assert!(!wallet.transactions_loading(&alice));
    assert_eq!(wallet.store().in_flight(), 0);

    assert_eq!(wallet.fetch_transactions(&alice).await, RunOutcome::Completed(1));
    assert_eq!(explorer.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn aborted_task_settles_its_status() {
    let explorer = MockExplorer::default()
        .with("alice.near", vec![tx("a", 10)])
        .delay_ms(50);
    let (wallet, _, _) = wallet(MockTokens::default(), explorer);
    let wallet = Arc::new(wallet);

    let task = tokio::spawn({
        let wallet = Arc::clone(&wallet);
        async move {
            let alice = ScopeKey::from("alice.near");
            wallet.fetch_transactions(&alice).await;
        }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(wallet.transactions_loading(&alice()));

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert!(!wallet.transactions_loading(&alice()));
    assert!(wallet.fetch_transactions(&alice()).await.is_completed());
}

#[tokio::test]
async fn accounts_are_independent() {
    let (wallet, _, explorer) = wallet(
        MockTokens::default(),
        MockExplorer::default()
            .with("alice.near", vec![tx("a", 10)])
            .with("bob.near", vec![tx("b", 20), tx("c", 30)])
            .delay_ms(10),
    );
    let alice = alice();
    let bob = ScopeKey::from("bob.near");

    let (a, b) = tokio::join!(
        wallet.fetch_transactions(&alice),
        wallet.fetch_transactions(&bob)
    );

    assert_eq!(a, RunOutcome::Completed(1));
    assert_eq!(b, RunOutcome::Completed(2));
    assert_eq!(explorer.list_calls.load(Ordering::SeqCst), 2);

    wallet.clear_transactions(&bob);
    assert!(wallet.transactions(&bob).is_empty());
    assert_eq!(wallet.transactions(&alice).len(), 1);
}

#[tokio::test]
async fn unknown_account_reads_as_empty() {
    let (wallet, _, _) = wallet(MockTokens::default(), MockExplorer::default());
    let ghost = ScopeKey::from("ghost.near");

    assert!(wallet.transactions(&ghost).is_empty());
    assert!(!wallet.transactions_loading(&ghost));
    assert!(wallet.tokens_with_metadata(&ghost).is_empty());
    assert_eq!(wallet.token(&ghost, "usn").balance, "");
    assert_eq!(wallet.store().revision(), 0);
}
