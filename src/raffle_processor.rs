use crate::raffle_error::RaffleError;
use crate::raffle_events::RaffleEvent;
use crate::raffle_instruction::RaffleInstruction;
use crate::raffle_state::{RaffleConfig, RandomnessSource, Raffle, RAFFLE_SEED};
use crate::settlement;
use crate::utils::{find_raffle_address, lamports_to_sol};
use crate::vrf;

use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction,
    system_program,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::InitializeRaffle { config } => {
                msg!("Instruction: Initialize Raffle");
                Self::process_initialize_raffle(accounts, config, program_id)
            }
            RaffleInstruction::EnterRaffle { amount } => {
                msg!("Instruction: Enter Raffle");
                Self::process_enter_raffle(accounts, amount, program_id)
            }
            RaffleInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, program_id)
            }
            RaffleInstruction::PerformUpkeep => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, program_id)
            }
            RaffleInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(accounts, request_id, &random_words, program_id)
            }
            RaffleInstruction::ConsumeVrfResult => {
                msg!("Instruction: Consume VRF Result");
                Self::process_consume_vrf_result(accounts, program_id)
            }
        }
    }

    fn process_initialize_raffle(
        accounts: &[AccountInfo],
        config: RaffleConfig,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        // Verify the admin signed the transaction
        if !admin_info.is_signer {
            msg!("Admin must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        // Find the PDA for this admin's raffle
        let (expected_raffle, bump_seed) = find_raffle_address(program_id, admin_info.key);
        if *raffle_info.key != expected_raffle {
            msg!("Invalid raffle account address");
            return Err(ProgramError::InvalidArgument);
        }
        if raffle_info.owner == program_id {
            msg!("Raffle account is already initialized");
            return Err(RaffleError::AlreadyInitialized.into());
        }

        config.validate()?;

        // Create the raffle account, sized for a full round
        let space = Raffle::space(&config)?;
        let bump = [bump_seed];
        let seeds: &[&[u8]] = &[RAFFLE_SEED, admin_info.key.as_ref(), &bump];
        Self::create_raffle_account(
            admin_info,
            raffle_info,
            system_program_info,
            space,
            program_id,
            seeds,
        )?;

        let now = Clock::get()?.unix_timestamp;
        let raffle = Raffle::new(*admin_info.key, bump_seed, config, now);
        raffle.save(raffle_info)?;

        msg!(
            "Raffle initialized: EntryFee={} SOL, Interval={}s, MaxPlayers={}, Source={:?}",
            lamports_to_sol(config.entry_fee),
            config.interval,
            config.max_players,
            config.source
        );
        Ok(())
    }

    /// Creates the raffle PDA. An address that already holds lamports cannot
    /// go through `create_account`, so it is topped up, allocated and
    /// assigned instead.
    fn create_raffle_account<'a>(
        payer_info: &AccountInfo<'a>,
        raffle_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
        space: usize,
        program_id: &Pubkey,
        seeds: &[&[u8]],
    ) -> ProgramResult {
        let rent_lamports = Rent::get()?.minimum_balance(space);
        let current_lamports = raffle_info.lamports();

        if current_lamports == 0 {
            return invoke_signed(
                &system_instruction::create_account(
                    payer_info.key,
                    raffle_info.key,
                    rent_lamports,
                    space as u64,
                    program_id,
                ),
                &[
                    payer_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
                &[seeds],
            );
        }

        msg!("Raffle address pre-funded with {} lamports", current_lamports);
        let top_up = rent_lamports.saturating_sub(current_lamports);
        if top_up > 0 {
            invoke(
                &system_instruction::transfer(payer_info.key, raffle_info.key, top_up),
                &[
                    payer_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }
        invoke_signed(
            &system_instruction::allocate(raffle_info.key, space as u64),
            &[raffle_info.clone(), system_program_info.clone()],
            &[seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(raffle_info.key, program_id),
            &[raffle_info.clone(), system_program_info.clone()],
            &[seeds],
        )
    }

    fn process_enter_raffle(
        accounts: &[AccountInfo],
        amount: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        // Admission is decided before any lamports move
        let mut raffle = Raffle::load(raffle_info, program_id)?;
        let index = raffle.enter(*player_info.key, amount)?;

        // Transfer the entry fee into the pot
        invoke(
            &system_instruction::transfer(player_info.key, raffle_info.key, amount),
            &[
                player_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;
        raffle.save(raffle_info)?;

        RaffleEvent::RaffleEnter {
            raffle: *raffle_info.key,
            player: *player_info.key,
            index,
            round: raffle.round,
        }
        .emit()?;
        msg!(
            "Entered raffle: players={} pot={} lamports",
            raffle.number_of_players(),
            raffle.pot()
        );
        Ok(())
    }

    fn process_check_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        let raffle = Raffle::load(raffle_info, program_id)?;
        let now = Clock::get()?.unix_timestamp;
        // Read-only: the answer goes out as return data
        let upkeep_needed = raffle.is_upkeep_needed(now);

        msg!("Upkeep needed: {}", upkeep_needed);
        set_return_data(&[upkeep_needed as u8]);
        Ok(())
    }

    /// Step 1 of a draw: close the round and ask for randomness
    fn process_perform_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;

        // Anyone can trigger the draw once the raffle is eligible
        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Raffle::load(raffle_info, program_id)?;
        let now = Clock::get()?.unix_timestamp;
        raffle.ensure_upkeep_needed(now)?;

        // Ask the configured provider for randomness
        let source = raffle.config.source;
        let request_id = match source {
            RandomnessSource::Oracle { .. } => vrf::issue_oracle_request(&mut raffle)?,
            RandomnessSource::Switchboard { .. } => {
                let switchboard = vrf::SwitchboardRequestAccounts::next(account_info_iter)?;
                let admin = raffle.admin;
                let bump = [raffle.bump];
                let seeds: &[&[u8]] = &[RAFFLE_SEED, admin.as_ref(), &bump];
                vrf::request_switchboard_randomness(
                    raffle_info,
                    &switchboard,
                    &source,
                    seeds,
                )?
            }
        };

        // Snapshot the entries and bind them to the request
        raffle.begin_draw(request_id, now)?;
        raffle.save(raffle_info)?;

        RaffleEvent::RequestedRaffleWinner {
            raffle: *raffle_info.key,
            request_id,
            players: raffle.number_of_players() as u32,
            pot: raffle.pot(),
            params: raffle.config.params,
        }
        .emit()?;
        Ok(())
    }

    /// Step 2 of a draw for oracle raffles
    fn process_fulfill_random_words(
        accounts: &[AccountInfo],
        request_id: u128,
        random_words: &[[u8; 32]],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let oracle_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        // Only the configured oracle may answer
        let mut raffle = Raffle::load(raffle_info, program_id)?;
        vrf::verify_oracle_signer(&raffle.config.source, oracle_info)?;

        let random_word = random_words.first().ok_or_else(|| {
            msg!("At least one random word is required");
            ProgramError::from(RaffleError::InvalidInstructionData)
        })?;

        Self::settle_draw(&mut raffle, raffle_info, winner_info, request_id, random_word)
    }

    /// Step 2 of a draw for Switchboard raffles
    fn process_consume_vrf_result(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let vrf_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        // The VRF account carries both the request counter and the result
        let mut raffle = Raffle::load(raffle_info, program_id)?;
        let (request_id, random_word) = vrf::read_vrf_result(&raffle.config.source, vrf_info)?;

        Self::settle_draw(&mut raffle, raffle_info, winner_info, request_id, &random_word)
    }

    /// Pays the winner of the pending request and reopens the raffle.
    fn settle_draw(
        raffle: &mut Raffle,
        raffle_info: &AccountInfo,
        winner_info: &AccountInfo,
        request_id: u128,
        random_word: &[u8; 32],
    ) -> ProgramResult {
        // Stale or unknown ids are rejected here, so a request settles once
        let pending = raffle.pending_request(request_id)?;
        let settlement = settlement::settle(&pending.participants, pending.pot, random_word)?;
        msg!(
            "Random winner index: {} of {}",
            settlement.winner_index,
            pending.participants.len()
        );

        // The caller must hand over the selected participant's account
        if *winner_info.key != settlement.winner {
            msg!(
                "Winner account {} does not match selected participant {}",
                winner_info.key,
                settlement.winner
            );
            return Err(RaffleError::WinnerAccountMismatch.into());
        }

        // Reset only after the payout went through
        settlement::pay_out(raffle_info, winner_info, settlement.payout)?;
        raffle.complete_draw(&settlement)?;
        raffle.save(raffle_info)?;

        RaffleEvent::WinnerPicked {
            raffle: *raffle_info.key,
            request_id,
            winner: settlement.winner,
            payout: settlement.payout,
            round: raffle.round,
        }
        .emit()?;
        msg!(
            "Raffle settled: {} SOL paid to {}",
            lamports_to_sol(settlement.payout),
            settlement.winner
        );
        Ok(())
    }
}
