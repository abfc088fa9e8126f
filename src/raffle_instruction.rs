use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::raffle_error::RaffleError;
use crate::raffle_state::RaffleConfig;
use crate::utils::find_raffle_address;
use crate::vrf::SwitchboardRequestKeys;

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Create the raffle PDA and write its configuration
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The admin, pays for the raffle account
    /// 1. `[writable]` The raffle account (PDA `["raffle", admin]`)
    /// 2. `[]` The system program
    InitializeRaffle { config: RaffleConfig },

    /// Enter the current round by paying exactly the entry fee
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    EnterRaffle { amount: u64 },

    /// Report whether a draw may be triggered now. Sets one byte of return
    /// data: 1 if upkeep is needed, 0 otherwise.
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep,

    /// Close entries and request randomness (anyone may call)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The caller
    /// 1. `[writable]` The raffle account
    /// For a Switchboard raffle, followed by the accounts of
    /// `SwitchboardRequestKeys::to_account_metas`
    PerformUpkeep,

    /// Deliver random words for the pending request (oracle raffles)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The oracle authority
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The winning participant
    FulfillRandomWords {
        request_id: u128,
        random_words: Vec<[u8; 32]>,
    },

    /// Settle with the verified Switchboard VRF result (anyone may call)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The caller
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The VRF account
    /// 3. `[writable]` The winning participant
    ConsumeVrfResult,
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| RaffleError::InvalidInstructionData.into())
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        self.try_to_vec()
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))
    }
}

/// Create initialize_raffle instruction
pub fn initialize_raffle(
    program_id: &Pubkey,
    admin: &Pubkey,
    config: RaffleConfig,
) -> Result<Instruction, ProgramError> {
    let (raffle, _) = find_raffle_address(program_id, admin);
    let data = RaffleInstruction::InitializeRaffle { config }.pack()?;

    let accounts = vec![
        AccountMeta::new(*admin, true),
        AccountMeta::new(raffle, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create enter_raffle instruction
pub fn enter_raffle(
    program_id: &Pubkey,
    player: &Pubkey,
    raffle: &Pubkey,
    amount: u64,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::EnterRaffle { amount }.pack()?;

    let accounts = vec![
        AccountMeta::new(*player, true),
        AccountMeta::new(*raffle, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, raffle: &Pubkey) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::CheckUpkeep.pack()?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*raffle, false)],
        data,
    })
}

/// Create perform_upkeep instruction for an oracle raffle
pub fn perform_upkeep(
    program_id: &Pubkey,
    caller: &Pubkey,
    raffle: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::PerformUpkeep.pack()?;

    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(*raffle, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create perform_upkeep instruction for a Switchboard raffle
pub fn perform_upkeep_with_vrf(
    program_id: &Pubkey,
    caller: &Pubkey,
    raffle: &Pubkey,
    switchboard: &SwitchboardRequestKeys,
) -> Result<Instruction, ProgramError> {
    let mut ix = perform_upkeep(program_id, caller, raffle)?;
    ix.accounts.extend(switchboard.to_account_metas());
    Ok(ix)
}

/// Create fulfill_random_words instruction
pub fn fulfill_random_words(
    program_id: &Pubkey,
    oracle: &Pubkey,
    raffle: &Pubkey,
    winner: &Pubkey,
    request_id: u128,
    random_words: Vec<[u8; 32]>,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::FulfillRandomWords {
        request_id,
        random_words,
    }
    .pack()?;

    let accounts = vec![
        AccountMeta::new_readonly(*oracle, true),
        AccountMeta::new(*raffle, false),
        AccountMeta::new(*winner, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create consume_vrf_result instruction
pub fn consume_vrf_result(
    program_id: &Pubkey,
    caller: &Pubkey,
    raffle: &Pubkey,
    vrf: &Pubkey,
    winner: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::ConsumeVrfResult.pack()?;

    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(*raffle, false),
        AccountMeta::new_readonly(*vrf, false),
        AccountMeta::new(*winner, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}
