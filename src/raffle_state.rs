use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    borsh::{get_instance_packed_len, try_from_slice_unchecked},
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    program_pack::IsInitialized,
    pubkey::Pubkey,
};

use crate::raffle_error::RaffleError;
use crate::settlement::Settlement;

/// Seed prefix of the raffle PDA: `["raffle", admin]`
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// Upper bound on entries per round. Both the ledger and the pending snapshot
/// must fit in an account created through CPI (10 KiB).
pub const MAX_PLAYERS: u32 = 150;

/// Status of the current round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Accepting entries
    Open,
    /// Waiting for the randomness provider to fulfill the pending request
    Calculating,
}

/// Where randomness comes from and who may deliver it
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RandomnessSource {
    /// Off-chain VRF coordinator. Watches `RequestedRaffleWinner` events and
    /// answers with a signed `FulfillRandomWords`.
    Oracle { authority: Pubkey },
    /// Switchboard V2 VRF account whose authority is the raffle PDA
    Switchboard {
        program_id: Pubkey,
        vrf: Pubkey,
        state_bump: u8,
        permission_bump: u8,
    },
}

/// Provider request parameters. Stored verbatim and forwarded with every
/// randomness request; the raffle itself never interprets them.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProviderParams {
    /// Gas lane / key hash selecting the oracle key
    pub key_hash: [u8; 32],
    /// Billing subscription at the provider
    pub subscription_id: u64,
    /// Confirmations the provider waits for before answering
    pub request_confirmations: u16,
    /// Compute budget reserved for the fulfillment
    pub callback_gas_limit: u32,
    /// Number of random words requested
    pub num_words: u32,
}

/// Raffle configuration, immutable after `InitializeRaffle`
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Exact entry fee in lamports
    pub entry_fee: u64,
    /// Minimum seconds between draws
    pub interval: i64,
    /// Maximum entries per round
    pub max_players: u32,
    pub source: RandomnessSource,
    pub params: ProviderParams,
}

impl RaffleConfig {
    pub fn validate(&self) -> Result<(), RaffleError> {
        if self.entry_fee == 0 {
            msg!("Entry fee must be greater than zero");
            return Err(RaffleError::InvalidConfig);
        }
        if self.interval < 0 {
            msg!("Interval cannot be negative");
            return Err(RaffleError::InvalidConfig);
        }
        if self.max_players == 0 || self.max_players > MAX_PLAYERS {
            msg!("Max players must be between 1 and {}", MAX_PLAYERS);
            return Err(RaffleError::InvalidConfig);
        }
        if self.params.num_words == 0 {
            msg!("At least one random word must be requested");
            return Err(RaffleError::InvalidConfig);
        }
        Ok(())
    }
}

/// Participants of the current round and the pot they paid into.
///
/// Insertion order is entry order; an address may appear more than once.
/// `pot == entry_fee * participants.len()` holds because only exact-fee
/// entries are admitted.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryLedger {
    participants: Vec<Pubkey>,
    pot: u64,
}

impl EntryLedger {
    /// Appends `player` and returns its index in the round.
    pub fn admit(
        &mut self,
        player: Pubkey,
        paid: u64,
        entry_fee: u64,
        capacity: u32,
    ) -> Result<u32, RaffleError> {
        if paid < entry_fee {
            return Err(RaffleError::InsufficientFee);
        }
        if paid > entry_fee {
            return Err(RaffleError::Overpayment);
        }
        if self.participants.len() >= capacity as usize {
            return Err(RaffleError::RaffleFull);
        }
        let pot = self.pot.checked_add(paid).ok_or(RaffleError::MathOverflow)?;
        let index = self.participants.len() as u32;
        self.participants.push(player);
        self.pot = pot;
        Ok(index)
    }

    pub fn snapshot(&self) -> (Vec<Pubkey>, u64) {
        (self.participants.clone(), self.pot)
    }

    pub fn reset(&mut self) {
        self.participants.clear();
        self.pot = 0;
    }

    pub fn participants(&self) -> &[Pubkey] {
        &self.participants
    }

    pub fn pot(&self) -> u64 {
        self.pot
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

/// Randomness request awaiting fulfillment, bound to the round it was made for
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: u128,
    pub participants: Vec<Pubkey>,
    pub pot: u64,
    pub requested_at: UnixTimestamp,
}

/// Raffle account data
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Raffle {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Creator of the raffle, part of the PDA seeds
    pub admin: Pubkey,
    /// PDA bump
    pub bump: u8,
    pub config: RaffleConfig,
    pub state: RaffleState,
    pub ledger: EntryLedger,
    /// Time of the last draw (or of initialization before the first one)
    pub last_timestamp: UnixTimestamp,
    /// Present iff `state == Calculating`
    pub pending: Option<PendingRequest>,
    /// Next id handed out by the oracle source
    pub next_request_id: u128,
    pub recent_winner: Option<Pubkey>,
    pub last_payout: u64,
    /// Number of settled rounds
    pub round: u64,
}

impl IsInitialized for Raffle {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Raffle {
    pub fn new(admin: Pubkey, bump: u8, config: RaffleConfig, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            admin,
            bump,
            config,
            state: RaffleState::Open,
            ledger: EntryLedger::default(),
            last_timestamp: now,
            pending: None,
            next_request_id: 1,
            recent_winner: None,
            last_payout: 0,
            round: 0,
        }
    }

    /// Account size able to hold a full ledger and a full pending snapshot.
    pub fn space(config: &RaffleConfig) -> Result<usize, ProgramError> {
        let full = vec![Pubkey::default(); config.max_players as usize];
        let mut raffle = Raffle::new(Pubkey::default(), 0, *config, 0);
        raffle.ledger.participants = full.clone();
        raffle.pending = Some(PendingRequest {
            request_id: 0,
            participants: full,
            pot: 0,
            requested_at: 0,
        });
        raffle.recent_winner = Some(Pubkey::default());
        get_instance_packed_len(&raffle).map_err(|e| ProgramError::BorshIoError(e.to_string()))
    }

    /// Reads an initialized raffle from an account owned by `program_id`.
    pub fn load(raffle_info: &AccountInfo, program_id: &Pubkey) -> Result<Self, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by the program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let raffle: Raffle = try_from_slice_unchecked(&raffle_info.try_borrow_data()?)
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
        if !raffle.is_initialized() {
            return Err(RaffleError::NotInitialized.into());
        }
        Ok(raffle)
    }

    pub fn save(&self, raffle_info: &AccountInfo) -> ProgramResult {
        let mut data = raffle_info.try_borrow_mut_data()?;
        self.serialize(&mut &mut data[..])
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))
    }

    /// Admits an entry while the round is open.
    pub fn enter(&mut self, player: Pubkey, amount: u64) -> Result<u32, RaffleError> {
        if self.state != RaffleState::Open {
            return Err(RaffleError::RoundNotOpen);
        }
        self.ledger
            .admit(player, amount, self.config.entry_fee, self.config.max_players)
    }

    pub fn is_upkeep_needed(&self, now: UnixTimestamp) -> bool {
        let is_open = self.state == RaffleState::Open;
        let has_players = !self.ledger.is_empty();
        let has_balance = self.ledger.pot() > 0;
        let time_passed = now.saturating_sub(self.last_timestamp) >= self.config.interval;
        is_open && has_players && has_balance && time_passed
    }

    pub fn ensure_upkeep_needed(&self, now: UnixTimestamp) -> Result<(), RaffleError> {
        if !self.is_upkeep_needed(now) {
            msg!(
                "Upkeep not needed: state={:?} players={} pot={} last={} now={}",
                self.state,
                self.ledger.len(),
                self.ledger.pot(),
                self.last_timestamp,
                now
            );
            return Err(RaffleError::UpkeepNotNeeded);
        }
        Ok(())
    }

    /// Moves the round to `Calculating`, binding `request_id` to a snapshot
    /// of the current entries.
    pub fn begin_draw(&mut self, request_id: u128, now: UnixTimestamp) -> Result<(), RaffleError> {
        self.ensure_upkeep_needed(now)?;
        let (participants, pot) = self.ledger.snapshot();
        self.pending = Some(PendingRequest {
            request_id,
            participants,
            pot,
            requested_at: now,
        });
        self.state = RaffleState::Calculating;
        self.last_timestamp = now;
        Ok(())
    }

    /// The pending request, if its id is `request_id`.
    pub fn pending_request(&self, request_id: u128) -> Result<&PendingRequest, RaffleError> {
        match &self.pending {
            Some(pending) if pending.request_id == request_id => Ok(pending),
            Some(pending) => {
                msg!(
                    "Request {} does not match pending request {}",
                    request_id,
                    pending.request_id
                );
                Err(RaffleError::UnknownRequest)
            }
            None => {
                msg!("No randomness request is pending");
                Err(RaffleError::UnknownRequest)
            }
        }
    }

    /// Closes the round after the winner has been paid.
    pub fn complete_draw(&mut self, settlement: &Settlement) -> Result<(), RaffleError> {
        self.pending = None;
        self.ledger.reset();
        self.state = RaffleState::Open;
        self.recent_winner = Some(settlement.winner);
        self.last_payout = settlement.payout;
        self.round = self.round.checked_add(1).ok_or(RaffleError::MathOverflow)?;
        Ok(())
    }

    pub fn entry_fee(&self) -> u64 {
        self.config.entry_fee
    }

    pub fn interval(&self) -> i64 {
        self.config.interval
    }

    pub fn provider(&self) -> &RandomnessSource {
        &self.config.source
    }

    pub fn provider_params(&self) -> &ProviderParams {
        &self.config.params
    }

    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.ledger.participants().get(index)
    }

    pub fn players(&self) -> &[Pubkey] {
        self.ledger.participants()
    }

    pub fn number_of_players(&self) -> usize {
        self.ledger.len()
    }

    pub fn pot(&self) -> u64 {
        self.ledger.pot()
    }

    pub fn pending_request_id(&self) -> Option<u128> {
        self.pending.as_ref().map(|pending| pending.request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::{settle, word_from_u64};

    const FEE: u64 = 100;
    const INTERVAL: i64 = 30;

    fn config() -> RaffleConfig {
        RaffleConfig {
            entry_fee: FEE,
            interval: INTERVAL,
            max_players: 10,
            source: RandomnessSource::Oracle {
                authority: Pubkey::new_unique(),
            },
            params: ProviderParams {
                num_words: 1,
                ..ProviderParams::default()
            },
        }
    }

    fn raffle() -> Raffle {
        Raffle::new(Pubkey::new_unique(), 255, config(), 1_000)
    }

    #[test]
    fn entry_grows_ledger_by_one_fee() {
        let mut raffle = raffle();
        for expected in 0..3u32 {
            let index = raffle.enter(Pubkey::new_unique(), FEE).unwrap();
            assert_eq!(index, expected);
            assert_eq!(raffle.pot(), FEE * (expected as u64 + 1));
        }
        assert_eq!(raffle.number_of_players(), 3);
    }

    #[test]
    fn same_player_may_enter_twice() {
        let mut raffle = raffle();
        let player = Pubkey::new_unique();
        raffle.enter(player, FEE).unwrap();
        raffle.enter(player, FEE).unwrap();
        assert_eq!(raffle.players(), &[player, player]);
    }

    #[test]
    fn rejects_wrong_amounts_without_mutation() {
        let mut raffle = raffle();
        let before = raffle.clone();
        assert_eq!(
            raffle.enter(Pubkey::new_unique(), 0),
            Err(RaffleError::InsufficientFee)
        );
        assert_eq!(
            raffle.enter(Pubkey::new_unique(), FEE - 1),
            Err(RaffleError::InsufficientFee)
        );
        assert_eq!(
            raffle.enter(Pubkey::new_unique(), FEE + 1),
            Err(RaffleError::Overpayment)
        );
        assert_eq!(raffle, before);
    }

    #[test]
    fn rejects_entries_beyond_capacity() {
        let mut raffle = raffle();
        for _ in 0..10 {
            raffle.enter(Pubkey::new_unique(), FEE).unwrap();
        }
        assert_eq!(
            raffle.enter(Pubkey::new_unique(), FEE),
            Err(RaffleError::RaffleFull)
        );
    }

    #[test]
    fn upkeep_requires_players() {
        let raffle = raffle();
        assert!(!raffle.is_upkeep_needed(1_000 + INTERVAL * 100));
    }

    #[test]
    fn upkeep_requires_interval() {
        let mut raffle = raffle();
        raffle.enter(Pubkey::new_unique(), FEE).unwrap();
        assert!(!raffle.is_upkeep_needed(1_000 + INTERVAL - 1));
        assert!(raffle.is_upkeep_needed(1_000 + INTERVAL));
    }

    #[test]
    fn draw_snapshots_and_blocks_entries() {
        let mut raffle = raffle();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        raffle.enter(a, FEE).unwrap();
        raffle.enter(b, FEE).unwrap();

        raffle.begin_draw(7, 1_100).unwrap();
        assert_eq!(raffle.state, RaffleState::Calculating);
        assert_eq!(raffle.last_timestamp, 1_100);
        let pending = raffle.pending_request(7).unwrap();
        assert_eq!(pending.participants, vec![a, b]);
        assert_eq!(pending.pot, 2 * FEE);

        assert_eq!(
            raffle.enter(Pubkey::new_unique(), FEE),
            Err(RaffleError::RoundNotOpen)
        );
        assert!(!raffle.is_upkeep_needed(10_000));
        assert_eq!(raffle.begin_draw(8, 10_000), Err(RaffleError::UpkeepNotNeeded));
        assert_eq!(raffle.pending_request_id(), Some(7));
    }

    #[test]
    fn ineligible_draw_leaves_state() {
        let mut raffle = raffle();
        raffle.enter(Pubkey::new_unique(), FEE).unwrap();
        let before = raffle.clone();
        assert_eq!(raffle.begin_draw(1, 1_001), Err(RaffleError::UpkeepNotNeeded));
        assert_eq!(raffle, before);
    }

    #[test]
    fn mismatched_request_keeps_pending() {
        let mut raffle = raffle();
        raffle.enter(Pubkey::new_unique(), FEE).unwrap();
        assert_eq!(
            raffle.pending_request(1).unwrap_err(),
            RaffleError::UnknownRequest
        );
        raffle.begin_draw(5, 2_000).unwrap();
        assert_eq!(
            raffle.pending_request(6).unwrap_err(),
            RaffleError::UnknownRequest
        );
        assert_eq!(raffle.pending_request_id(), Some(5));
    }

    #[test]
    fn four_player_round_pays_third_entrant() {
        let mut raffle = raffle();
        let players: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        for player in &players {
            raffle.enter(*player, FEE).unwrap();
        }
        assert_eq!(raffle.pot(), 400);
        raffle.begin_draw(1, 1_000 + INTERVAL + 1).unwrap();

        let pending = raffle.pending_request(1).unwrap().clone();
        let settlement = settle(&pending.participants, pending.pot, &word_from_u64(402)).unwrap();
        assert_eq!(settlement.winner_index, 2);
        assert_eq!(settlement.winner, players[2]);
        assert_eq!(settlement.payout, 400);

        raffle.complete_draw(&settlement).unwrap();
        assert_eq!(raffle.state, RaffleState::Open);
        assert_eq!(raffle.number_of_players(), 0);
        assert_eq!(raffle.pot(), 0);
        assert_eq!(raffle.recent_winner, Some(players[2]));
        assert_eq!(raffle.last_payout, 400);
        assert_eq!(raffle.pending, None);
        assert_eq!(
            raffle.pending_request(1).unwrap_err(),
            RaffleError::UnknownRequest
        );

        let index = raffle.enter(Pubkey::new_unique(), FEE).unwrap();
        assert_eq!(index, 0);
        assert_eq!(raffle.pot(), FEE);
        assert_eq!(raffle.round, 1);
    }

    #[test]
    fn account_round_trips_through_borsh() {
        let mut raffle = raffle();
        raffle.enter(Pubkey::new_unique(), FEE).unwrap();
        raffle.begin_draw(3, 5_000).unwrap();

        let space = Raffle::space(&raffle.config).unwrap();
        let mut data = vec![0u8; space];
        raffle.serialize(&mut &mut data[..]).unwrap();
        let decoded: Raffle = try_from_slice_unchecked(&data).unwrap();
        assert_eq!(decoded, raffle);
    }

    #[test]
    fn zeroed_account_is_not_initialized() {
        let data = vec![0u8; Raffle::space(&config()).unwrap()];
        let decoded: Raffle = try_from_slice_unchecked(&data).unwrap();
        assert!(!decoded.is_initialized());
    }

    #[test]
    fn max_sized_account_fits_cpi_limit() {
        let mut config = config();
        config.max_players = MAX_PLAYERS;
        assert!(Raffle::space(&config).unwrap() <= 10_240);
        config.max_players = MAX_PLAYERS + 1;
        assert_eq!(config.validate(), Err(RaffleError::InvalidConfig));
    }
}
