use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::event_log::checkpoint::{AccountOwner, Checkpoint};
use crate::event_log::checkpoint_store::CheckpointStore;
use crate::events::base::{AssetEnabled, Event, PartyCreated};
use crate::interfaces::event_sink::EventSink;
use crate::invariants::checks::InvariantChecks;
use crate::invariants::kill_switch::KillSwitch;
use crate::liquidation::distressed;
use crate::observability::metrics::{CHECKPOINT_SIZE_BYTES, SETTLEMENT_BATCHES};
use crate::observability::tracing::{checkpoint_span, margin_span, settlement_span};
use crate::settlement::accounts::AccountStore;
use crate::settlement::clearing;
use crate::settlement::collector;
use crate::settlement::fees::{self, FeeTransfer};
use crate::settlement::ledger::{EntryType, Ledger, LedgerEntry, TransferBalance, TransferResponse};
use crate::settlement::margin::{self, MarginOutcome};
use crate::settlement::reconciliation::Reconciliation;
use crate::settlement::transfer::{general_account_id, PartyTransfer};
use crate::types::account::{Account, AccountType, Owner};
use crate::types::balance::Balance;
use crate::types::ids::{AccountId, AssetId, MarketId, PartyId};
use crate::types::timestamp::Timestamp;

/// Sole owner of every balance in the network. A fatal error trips the kill
/// switch and later mutating calls fail with `KillSwitchActive`.
pub struct CollateralEngine {
    store: AccountStore,
    ledger: Ledger,
    sink: Arc<dyn EventSink>,
    now: Timestamp,
    enabled_assets: BTreeSet<AssetId>,
    // Deposits minus withdrawals (plus seeded insurance), per asset.
    totals: BTreeMap<AssetId, Balance>,
    config: EngineConfig,
    kill_switch: KillSwitch,
}

impl CollateralEngine {
    pub fn new(config: EngineConfig, sink: Arc<dyn EventSink>) -> Self {
        CollateralEngine {
            store: AccountStore::new(sink.clone()),
            ledger: Ledger::new(),
            sink,
            now: Timestamp::default(),
            enabled_assets: BTreeSet::new(),
            totals: BTreeMap::new(),
            config,
            kill_switch: KillSwitch::new(),
        }
    }

    pub fn on_chain_time_update(&mut self, timestamp: Timestamp) {
        self.now = timestamp;
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    pub fn get_account(&self, id: &AccountId) -> Result<&Account> {
        self.store.get(id)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.kill_switch.is_active() {
            let reason = self.kill_switch.reason().unwrap_or_default();
            tracing::warn!("Collateral engine is halted, rejecting call");
            return Err(Error::KillSwitchActive(reason));
        }
        Ok(())
    }

    fn ensure_asset(&self, asset: &AssetId) -> Result<()> {
        if !self.enabled_assets.contains(asset) {
            return Err(Error::AssetNotEnabled(asset.clone()));
        }
        Ok(())
    }

    fn guard<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.is_fatal() {
                self.kill_switch.activate(e.to_string());
            }
        }
        result
    }

    fn record(&mut self, responses: &[TransferResponse]) -> Result<()> {
        for response in responses {
            if self.config.verify_conservation {
                self.guard(Reconciliation::verify_double_entry(response))?;
            }
            self.ledger.record_response(response);
        }
        Ok(())
    }

    fn verify_after_batch(&self) -> Result<()> {
        if self.config.verify_conservation {
            self.guard(Reconciliation::verify_conservation_of_value(&self.store, &self.totals))?;
        }
        Ok(())
    }

    pub fn enable_asset(&mut self, asset: AssetId) -> Result<()> {
        self.ensure_running()?;
        if self.enabled_assets.contains(&asset) {
            return Err(Error::AssetAlreadyEnabled(asset));
        }

        for account_type in [
            AccountType::GlobalInsurance,
            AccountType::GlobalReward,
            AccountType::FeesInfrastructure,
            AccountType::PendingTransfers,
        ] {
            self.store.create_or_get(&MarketId::none(), &Owner::System, &asset, account_type);
        }
        self.totals.entry(asset.clone()).or_insert_with(Balance::zero);
        self.enabled_assets.insert(asset.clone());

        tracing::info!(asset = %asset, "Asset enabled");
        self.sink.send(Event::AssetEnabled(AssetEnabled { asset }));
        Ok(())
    }

    pub fn asset_exists(&self, asset: &AssetId) -> bool {
        self.enabled_assets.contains(asset)
    }

    /// Insurance is seeded with `initial_insurance` only on first creation.
    pub fn create_market_accounts(
        &mut self,
        market_id: &MarketId,
        asset: &AssetId,
        initial_insurance: Balance,
    ) -> Result<(AccountId, AccountId)> {
        self.ensure_running()?;
        self.ensure_asset(asset)?;

        let insurance_exists = self.store.contains(&AccountId::derive(
            market_id,
            &Owner::System,
            asset,
            AccountType::Insurance,
        ));
        let insurance = self.store.create_or_get(market_id, &Owner::System, asset, AccountType::Insurance);
        if !insurance_exists && !initial_insurance.is_zero() {
            self.store.set_balance(&insurance, initial_insurance.clone())?;
            *self.totals.entry(asset.clone()).or_insert_with(Balance::zero) += &initial_insurance;
        }
        let settlement = self.store.create_or_get(market_id, &Owner::System, asset, AccountType::Settlement);
        for fee_pool in [AccountType::MakerFeeReward, AccountType::LPFeeReward] {
            self.store.create_or_get(market_id, &Owner::System, asset, fee_pool);
        }

        tracing::info!(market_id = %market_id, asset = %asset, "Market accounts created");
        Ok((insurance, settlement))
    }

    pub fn create_party_general_account(&mut self, party: &PartyId, asset: &AssetId) -> Result<AccountId> {
        self.ensure_running()?;
        self.ensure_asset(asset)?;
        let owner = Owner::Party(party.clone());
        let is_new_party = self.store.party_accounts(&owner).next().is_none();
        let id = self.store.create_or_get(&MarketId::none(), &owner, asset, AccountType::General);
        if is_new_party {
            self.sink.send(Event::PartyCreated(PartyCreated { party: party.clone() }));
        }
        Ok(id)
    }

    pub fn create_party_margin_account(
        &mut self,
        party: &PartyId,
        market_id: &MarketId,
        asset: &AssetId,
    ) -> Result<AccountId> {
        self.ensure_running()?;
        self.ensure_asset(asset)?;
        if !self.store.contains(&general_account_id(party, asset)) {
            return Err(Error::NoGeneralAccount {
                party: party.clone(),
                asset: asset.clone(),
            });
        }
        Ok(self.store.create_or_get(market_id, &Owner::Party(party.clone()), asset, AccountType::Margin))
    }

    /// A party's first activity in a market. Returns `(margin, general)`.
    pub fn create_party_accounts(
        &mut self,
        party: &PartyId,
        market_id: &MarketId,
        asset: &AssetId,
    ) -> Result<(AccountId, AccountId)> {
        let general = self.create_party_general_account(party, asset)?;
        let margin = self.create_party_margin_account(party, market_id, asset)?;
        Ok((margin, general))
    }

    pub fn get_or_create_party_bond_account(
        &mut self,
        party: &PartyId,
        market_id: &MarketId,
        asset: &AssetId,
    ) -> Result<AccountId> {
        self.ensure_running()?;
        self.ensure_asset(asset)?;
        if !self.store.contains(&general_account_id(party, asset)) {
            return Err(Error::NoGeneralAccount {
                party: party.clone(),
                asset: asset.clone(),
            });
        }
        Ok(self.store.create_or_get(market_id, &Owner::Party(party.clone()), asset, AccountType::Bond))
    }

    pub fn get_or_create_reward_account(
        &mut self,
        market_id: &MarketId,
        asset: &AssetId,
        account_type: AccountType,
    ) -> Result<AccountId> {
        self.ensure_running()?;
        self.ensure_asset(asset)?;
        if !account_type.is_market_reward() {
            return Err(Error::InvalidAccountType {
                operation: "reward account",
                account_type,
            });
        }
        Ok(self.store.create_or_get(market_id, &Owner::System, asset, account_type))
    }

    pub fn deposit(&mut self, party: &PartyId, asset: &AssetId, amount: Balance) -> Result<TransferResponse> {
        self.ensure_running()?;
        let general = self.create_party_general_account(party, asset)?;
        self.store.increment_balance(&general, &amount)?;
        *self.totals.entry(asset.clone()).or_insert_with(Balance::zero) += &amount;

        let response = TransferResponse {
            entries: vec![LedgerEntry {
                from_account: AccountId::external(asset),
                to_account: general.clone(),
                amount: amount.clone(),
                reference: EntryType::Deposit.to_string(),
                entry_type: EntryType::Deposit,
                timestamp: self.now,
            }],
            balances: vec![TransferBalance {
                account: self.store.get(&general)?.clone(),
                credited: amount,
            }],
        };
        self.ledger.record_response(&response);
        Ok(response)
    }

    pub fn withdraw(&mut self, party: &PartyId, asset: &AssetId, amount: Balance) -> Result<TransferResponse> {
        self.ensure_running()?;
        self.ensure_asset(asset)?;
        let general = general_account_id(party, asset);
        let available = match self.store.get(&general) {
            Ok(account) => account.balance.clone(),
            Err(_) => {
                return Err(Error::NoGeneralAccount {
                    party: party.clone(),
                    asset: asset.clone(),
                });
            }
        };
        if available < amount {
            return Err(Error::NotEnoughFundsToWithdraw {
                requested: amount,
                available,
            });
        }

        let result = self.store.decrement_balance(&general, &amount);
        self.guard(result)?;
        let total = self.totals.entry(asset.clone()).or_insert_with(Balance::zero);
        *total = total.saturating_sub(&amount);

        let response = TransferResponse {
            entries: vec![LedgerEntry {
                from_account: general,
                to_account: AccountId::external(asset),
                amount,
                reference: EntryType::Withdraw.to_string(),
                entry_type: EntryType::Withdraw,
                timestamp: self.now,
            }],
            balances: Vec::new(),
        };
        self.ledger.record_response(&response);
        Ok(response)
    }

    fn settle(
        &mut self,
        kind: &'static str,
        market_id: &MarketId,
        asset: &AssetId,
        transfers: &[PartyTransfer],
    ) -> Result<Vec<TransferResponse>> {
        self.ensure_running()?;
        let span = settlement_span(kind, market_id, asset);
        let _enter = span.enter();
        SETTLEMENT_BATCHES.with_label_values(&[kind]).inc();

        let result = collector::collect(&mut self.store, self.sink.as_ref(), market_id, asset, transfers, self.now);
        let responses = self.guard(result)?;
        self.record(&responses)?;
        self.verify_after_batch()?;
        Ok(responses)
    }

    pub fn mark_to_market(
        &mut self,
        market_id: &MarketId,
        asset: &AssetId,
        transfers: &[PartyTransfer],
    ) -> Result<Vec<TransferResponse>> {
        self.settle("mark_to_market", market_id, asset, transfers)
    }

    pub fn final_settlement(
        &mut self,
        market_id: &MarketId,
        asset: &AssetId,
        transfers: &[PartyTransfer],
    ) -> Result<Vec<TransferResponse>> {
        self.settle("final_settlement", market_id, asset, transfers)
    }

    pub fn apply_margin_updates(&mut self, market_id: &MarketId, updates: &[PartyTransfer]) -> Result<MarginOutcome> {
        self.ensure_running()?;
        let span = margin_span(market_id);
        let _enter = span.enter();

        let result = margin::apply_margin_updates(&mut self.store, market_id, updates, self.now);
        let outcome = self.guard(result)?;
        self.record(&outcome.responses)?;
        self.verify_after_batch()?;
        Ok(outcome)
    }

    pub fn margin_update_on_order(&mut self, market_id: &MarketId, update: &PartyTransfer) -> Result<TransferResponse> {
        self.ensure_running()?;
        let result = margin::margin_update_on_order(&mut self.store, market_id, update, self.now);
        let response = self.guard(result)?;
        self.record(std::slice::from_ref(&response))?;
        Ok(response)
    }

    pub fn rollback_margin_update_on_order(
        &mut self,
        market_id: &MarketId,
        transfer: &PartyTransfer,
    ) -> Result<TransferResponse> {
        self.ensure_running()?;
        let result = margin::rollback_margin_update_on_order(&mut self.store, market_id, transfer, self.now);
        let response = self.guard(result)?;
        self.record(std::slice::from_ref(&response))?;
        Ok(response)
    }

    pub fn bond_update(&mut self, market_id: &MarketId, transfer: &PartyTransfer) -> Result<TransferResponse> {
        self.ensure_running()?;
        let result = margin::bond_update(&mut self.store, market_id, transfer, self.now);
        let response = self.guard(result)?;
        self.record(std::slice::from_ref(&response))?;
        Ok(response)
    }

    pub fn transfer_fees(
        &mut self,
        market_id: &MarketId,
        asset: &AssetId,
        transfers: &[FeeTransfer],
    ) -> Result<Vec<TransferResponse>> {
        self.ensure_running()?;
        let span = settlement_span("transfer_fees", market_id, asset);
        let _enter = span.enter();
        SETTLEMENT_BATCHES.with_label_values(&["transfer_fees"]).inc();

        let result = fees::transfer_fees(&mut self.store, market_id, asset, transfers, self.now);
        let responses = self.guard(result)?;
        self.record(&responses)?;
        self.verify_after_batch()?;
        Ok(responses)
    }

    /// Outside auctions every payer must cover its fees in full, checked
    /// before anything moves.
    pub fn transfer_fees_continuous_trading(
        &mut self,
        market_id: &MarketId,
        asset: &AssetId,
        transfers: &[FeeTransfer],
    ) -> Result<Vec<TransferResponse>> {
        self.ensure_running()?;
        if transfers.is_empty() {
            return Ok(Vec::new());
        }
        fees::check_fee_funds(&self.store, market_id, asset, transfers)?;
        self.transfer_fees(market_id, asset, transfers)
    }

    pub fn clear_market(
        &mut self,
        market_id: &MarketId,
        asset: &AssetId,
        parties: &[PartyId],
    ) -> Result<Vec<TransferResponse>> {
        self.ensure_running()?;
        let span = settlement_span("clear_market", market_id, asset);
        let _enter = span.enter();

        let result = clearing::clear_market(&mut self.store, market_id, asset, parties, self.now);
        let responses = self.guard(result)?;
        self.record(&responses)?;
        self.verify_after_batch()?;
        Ok(responses)
    }

    pub fn clear_party_margin_account(
        &mut self,
        party: &PartyId,
        market_id: &MarketId,
        asset: &AssetId,
    ) -> Result<TransferResponse> {
        self.ensure_running()?;
        let result = clearing::clear_party_margin_account(&mut self.store, party, market_id, asset, self.now);
        let response = self.guard(result)?;
        self.record(std::slice::from_ref(&response))?;
        Ok(response)
    }

    pub fn remove_distressed(
        &mut self,
        market_id: &MarketId,
        asset: &AssetId,
        parties: &[PartyId],
    ) -> Result<TransferResponse> {
        self.ensure_running()?;
        let span = settlement_span("remove_distressed", market_id, asset);
        let _enter = span.enter();

        let result = distressed::remove_distressed(&mut self.store, market_id, asset, parties, self.now);
        let response = self.guard(result)?;
        self.record(std::slice::from_ref(&response))?;
        self.verify_after_batch()?;
        Ok(response)
    }

    pub fn checkpoint(&self) -> Result<Vec<u8>> {
        let span = checkpoint_span("save");
        let _enter = span.enter();

        let checkpoint = self.guard(Checkpoint::from_store(&self.store))?;
        let bytes = checkpoint.encode()?;
        CHECKPOINT_SIZE_BYTES.set(bytes.len() as i64);
        tracing::info!(entries = checkpoint.balances.len(), bytes = bytes.len(), "Checkpoint created");
        Ok(bytes)
    }

    pub fn save_checkpoint(&self, store: &CheckpointStore, height: u64) -> Result<PathBuf> {
        let bytes = self.checkpoint()?;
        store.save(height, &bytes)
    }

    /// Only for an engine holding no funds yet. The blob is fully validated
    /// before anything is written. Returns the blob's format version.
    pub fn load_checkpoint(&mut self, bytes: &[u8]) -> Result<u32> {
        self.ensure_running()?;
        let span = checkpoint_span("load");
        let _enter = span.enter();

        if let Some(funded) = self.store.iter().find(|a| !a.balance.is_zero()) {
            return Err(Error::CheckpointTargetNotEmpty(funded.id.clone()));
        }
        let checkpoint = Checkpoint::decode(bytes)?;

        let new_parties: Vec<PartyId> = checkpoint.balances.iter()
            .filter_map(|b| match &b.owner {
                AccountOwner::Party(party) => Some(party.clone()),
                AccountOwner::SystemPool(_) => None,
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|party| self.store.party_accounts(&Owner::Party(party.clone())).next().is_none())
            .collect();

        checkpoint.restore(&mut self.store, &self.enabled_assets)?;
        for party in new_parties {
            self.sink.send(Event::PartyCreated(PartyCreated { party }));
        }
        for asset in &self.enabled_assets {
            self.totals.insert(asset.clone(), self.store.total_for_asset(asset));
        }

        tracing::info!(
            version = checkpoint.version,
            entries = checkpoint.balances.len(),
            "Checkpoint restored"
        );
        Ok(checkpoint.version)
    }

    pub fn has_balance(&self, party: &PartyId) -> bool {
        self.store.party_accounts(&Owner::Party(party.clone()))
            .any(|a| !a.balance.is_zero())
    }

    pub fn total_amount(&self, asset: &AssetId) -> Balance {
        self.totals.get(asset).cloned().unwrap_or_else(Balance::zero)
    }

    /// SHA-256 over every account id and balance, in id order.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        for account in self.store.iter() {
            hasher.update(account.id.as_str().as_bytes());
            hasher.update(account.balance.to_bytes_be());
        }
        hex::encode(hasher.finalize())
    }

    /// Block boundaries only: settlement accounts must be empty.
    pub fn check_invariants(&self) -> Result<()> {
        let result = InvariantChecks::check_account_ids(&self.store)
            .and_then(|_| InvariantChecks::check_party_accounts_owned(&self.store))
            .and_then(|_| InvariantChecks::check_settlement_accounts_empty(&self.store))
            .and_then(|_| Reconciliation::verify_conservation_of_value(&self.store, &self.totals));
        self.guard(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::producer::BufferedEventSink;
    use crate::settlement::fees::FeeTransferType;
    use crate::settlement::transfer::{margin_account_id, TransferType};

    fn engine() -> (CollateralEngine, Arc<BufferedEventSink>) {
        let sink = Arc::new(BufferedEventSink::new());
        let mut engine = CollateralEngine::new(EngineConfig::default(), sink.clone());
        engine.enable_asset(AssetId::from("BTC")).unwrap();
        (engine, sink)
    }

    #[test]
    fn test_enable_asset_twice_fails() {
        let (mut engine, _) = engine();
        assert!(matches!(
            engine.enable_asset(AssetId::from("BTC")),
            Err(Error::AssetAlreadyEnabled(_))
        ));
        assert!(engine.asset_exists(&AssetId::from("BTC")));
        assert_eq!(engine.store().len(), 4);
    }

    #[test]
    fn test_market_accounts_require_enabled_asset() {
        let (mut engine, _) = engine();
        let err = engine.create_market_accounts(&MarketId::from("m1"), &AssetId::from("ETH"), Balance::zero())
            .unwrap_err();
        assert!(matches!(err, Error::AssetNotEnabled(_)));
    }

    #[test]
    fn test_insurance_seeded_once() {
        let (mut engine, _) = engine();
        let market = MarketId::from("m1");
        let asset = AssetId::from("BTC");
        let (insurance, _) = engine.create_market_accounts(&market, &asset, Balance::from_u64(50)).unwrap();
        engine.create_market_accounts(&market, &asset, Balance::from_u64(50)).unwrap();
        assert_eq!(engine.get_account(&insurance).unwrap().balance, Balance::from_u64(50));
        assert_eq!(engine.total_amount(&asset), Balance::from_u64(50));
    }

    #[test]
    fn test_margin_account_needs_general() {
        let (mut engine, _) = engine();
        let err = engine.create_party_margin_account(&PartyId::from("p"), &MarketId::from("m1"), &AssetId::from("BTC"))
            .unwrap_err();
        assert!(matches!(err, Error::NoGeneralAccount { .. }));
    }

    #[test]
    fn test_deposit_withdraw_and_totals() {
        let (mut engine, sink) = engine();
        let party = PartyId::from("p");
        let asset = AssetId::from("BTC");
        sink.drain();

        engine.deposit(&party, &asset, Balance::from_u64(100)).unwrap();
        assert!(engine.has_balance(&party));
        let events = sink.drain();
        assert!(events.iter().any(|e| matches!(e, Event::PartyCreated(_))));

        let err = engine.withdraw(&party, &asset, Balance::from_u64(101)).unwrap_err();
        assert!(matches!(err, Error::NotEnoughFundsToWithdraw { .. }));

        engine.withdraw(&party, &asset, Balance::from_u64(100)).unwrap();
        assert!(!engine.has_balance(&party));
        assert_eq!(engine.total_amount(&asset), Balance::zero());
        assert_eq!(engine.ledger().len(), 2);
        engine.check_invariants().unwrap();
    }

    #[test]
    fn test_reward_account_type_checked() {
        let (mut engine, _) = engine();
        let market = MarketId::from("m1");
        let asset = AssetId::from("BTC");
        engine.get_or_create_reward_account(&market, &asset, AccountType::LPFeeReward).unwrap();
        let err = engine.get_or_create_reward_account(&market, &asset, AccountType::Margin).unwrap_err();
        assert!(matches!(err, Error::InvalidAccountType { .. }));
    }

    #[test]
    fn test_fatal_error_halts_engine() {
        let (mut engine, _) = engine();
        let market = MarketId::from("m1");
        let asset = AssetId::from("BTC");
        engine.create_market_accounts(&market, &asset, Balance::zero()).unwrap();
        for party in ["loser", "winner"] {
            let party = PartyId::from(party);
            engine.deposit(&party, &asset, Balance::from_u64(100)).unwrap();
            engine.create_party_accounts(&party, &market, &asset).unwrap();
        }
        let loser = PartyTransfer::new(PartyId::from("loser"), asset.clone(), TransferType::MarginLow, Balance::from_u64(100));
        engine.apply_margin_updates(&market, &[loser]).unwrap();

        // winner asks for less than was collected, leaving settlement non-empty
        let batch = vec![
            PartyTransfer::new(PartyId::from("loser"), asset.clone(), TransferType::MtmLoss, Balance::from_u64(100)),
            PartyTransfer::new(PartyId::from("winner"), asset.clone(), TransferType::MtmWin, Balance::from_u64(10)),
        ];
        let err = engine.mark_to_market(&market, &asset, &batch).unwrap_err();
        assert!(matches!(err, Error::SettlementBalanceNotZero { .. }));
        assert!(engine.kill_switch().is_active());

        let err = engine.deposit(&PartyId::from("x"), &asset, Balance::from_u64(1)).unwrap_err();
        assert!(matches!(err, Error::KillSwitchActive(_)));
    }

    #[test]
    fn test_hash_tracks_state() {
        let (mut a, _) = engine();
        let (mut b, _) = engine();
        assert_eq!(a.hash(), b.hash());
        a.deposit(&PartyId::from("p"), &AssetId::from("BTC"), Balance::from_u64(1)).unwrap();
        assert_ne!(a.hash(), b.hash());
        b.deposit(&PartyId::from("p"), &AssetId::from("BTC"), Balance::from_u64(1)).unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_entries_stamped_with_chain_time() {
        let (mut engine, _) = engine();
        let market = MarketId::from("m1");
        let asset = AssetId::from("BTC");
        let party = PartyId::from("p");
        engine.on_chain_time_update(Timestamp::from_nanos(42));
        engine.deposit(&party, &asset, Balance::from_u64(10)).unwrap();
        engine.create_party_accounts(&party, &market, &asset).unwrap();
        engine.clear_party_margin_account(&party, &market, &asset).unwrap();
        assert!(engine.get_account(&margin_account_id(&market, &party, &asset)).is_ok());
        assert!(engine.ledger().entries().iter().all(|e| e.timestamp == Timestamp::from_nanos(42)));
    }

    #[test]
    fn test_checkpoint_refused_once_funded() {
        let (mut source, _) = engine();
        source.deposit(&PartyId::from("p"), &AssetId::from("BTC"), Balance::from_u64(10)).unwrap();
        let blob = source.checkpoint().unwrap();

        let (mut target, _) = engine();
        target.deposit(&PartyId::from("q"), &AssetId::from("BTC"), Balance::from_u64(3)).unwrap();
        let err = target.load_checkpoint(&blob).unwrap_err();
        assert!(matches!(err, Error::CheckpointTargetNotEmpty(_)));
        assert_eq!(target.total_amount(&AssetId::from("BTC")), Balance::from_u64(3));
        assert!(!target.has_balance(&PartyId::from("p")));

        let (mut fresh, _) = engine();
        assert_eq!(fresh.load_checkpoint(&blob).unwrap(), crate::CHECKPOINT_VERSION);
    }

    #[test]
    fn test_saved_checkpoint_restores_by_height() {
        let dir = std::env::temp_dir().join(format!("collateral-engine-save-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let store = CheckpointStore::new(&dir, 5);

        let (mut source, _) = engine();
        source.deposit(&PartyId::from("p"), &AssetId::from("BTC"), Balance::from_u64(10)).unwrap();
        source.save_checkpoint(&store, 7).unwrap();
        source.deposit(&PartyId::from("p"), &AssetId::from("BTC"), Balance::from_u64(5)).unwrap();
        source.save_checkpoint(&store, 8).unwrap();

        let (mut restored, _) = engine();
        restored.load_checkpoint(&store.load_at_height(7).unwrap()).unwrap();
        assert_eq!(restored.total_amount(&AssetId::from("BTC")), Balance::from_u64(10));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_continuous_trading_fees_checked_before_moving() {
        let (mut engine, _) = engine();
        let market = MarketId::from("m1");
        let asset = AssetId::from("BTC");
        engine.create_market_accounts(&market, &asset, Balance::zero()).unwrap();
        for (party, amount) in [("rich", 100), ("poor", 5)] {
            let party = PartyId::from(party);
            engine.deposit(&party, &asset, Balance::from_u64(amount)).unwrap();
            engine.create_party_accounts(&party, &market, &asset).unwrap();
        }
        let entries = engine.ledger().len();

        let batch = vec![
            FeeTransfer::new(PartyId::from("rich"), asset.clone(), FeeTransferType::InfrastructureFeePay, Balance::from_u64(10)),
            FeeTransfer::new(PartyId::from("poor"), asset.clone(), FeeTransferType::InfrastructureFeePay, Balance::from_u64(10)),
        ];
        let err = engine.transfer_fees_continuous_trading(&market, &asset, &batch).unwrap_err();
        assert!(matches!(err, Error::InsufficientFundsToPayFees { .. }));
        assert!(!err.is_fatal());
        assert_eq!(engine.ledger().len(), entries);
        let rich = general_account_id(&PartyId::from("rich"), &asset);
        assert_eq!(engine.get_account(&rich).unwrap().balance, Balance::from_u64(100));

        // auctions skip the funds check and take what is there
        let responses = engine.transfer_fees(&market, &asset, &batch).unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1].total_moved(), Balance::from_u64(5));
        assert_eq!(engine.total_amount(&asset), Balance::from_u64(105));
        engine.check_invariants().unwrap();
    }
}
