use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    entrypoint::ProgramResult, log::sol_log_data, msg, program_error::ProgramError, pubkey::Pubkey,
};

use crate::raffle_state::ProviderParams;

/// Events observable in the transaction logs.
///
/// Each event is logged twice: once readable through `msg!`, once as a
/// borsh-encoded `Program data:` entry that indexers decode.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum RaffleEvent {
    RaffleEnter {
        raffle: Pubkey,
        player: Pubkey,
        index: u32,
        round: u64,
    },
    RequestedRaffleWinner {
        raffle: Pubkey,
        request_id: u128,
        players: u32,
        pot: u64,
        params: ProviderParams,
    },
    WinnerPicked {
        raffle: Pubkey,
        request_id: u128,
        winner: Pubkey,
        payout: u64,
        round: u64,
    },
}

impl RaffleEvent {
    pub fn emit(&self) -> ProgramResult {
        match self {
            RaffleEvent::RaffleEnter { player, index, .. } => {
                msg!("RaffleEnter: player={} index={}", player, index)
            }
            RaffleEvent::RequestedRaffleWinner { request_id, .. } => {
                msg!("RequestedRaffleWinner: request_id={}", request_id)
            }
            RaffleEvent::WinnerPicked { winner, payout, .. } => {
                msg!("WinnerPicked: winner={} payout={}", winner, payout)
            }
        }
        let data = self
            .try_to_vec()
            .map_err(|e| ProgramError::BorshIoError(e.to_string()))?;
        sol_log_data(&[&data]);
        Ok(())
    }
}
