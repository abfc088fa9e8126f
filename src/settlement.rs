use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    pubkey::Pubkey,
    rent::Rent,
    sysvar::Sysvar,
};

use crate::raffle_error::RaffleError;

/// Outcome of a draw
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub winner_index: u32,
    pub winner: Pubkey,
    pub payout: u64,
}

/// Reduces a 256-bit big-endian random word modulo `count`.
///
/// Plain modulo: when `2^256` is not a multiple of `count` the low indexes are
/// very slightly favoured. The bias is accepted and not corrected so that the
/// winner can be recomputed from the snapshot with the same rule.
pub fn winner_index(random_word: &[u8; 32], count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let modulus = count as u128;
    random_word
        .iter()
        .fold(0u128, |acc, byte| ((acc << 8) | *byte as u128) % modulus) as usize
}

/// Selects the winner of `participants` and the amount they receive.
pub fn settle(
    participants: &[Pubkey],
    pot: u64,
    random_word: &[u8; 32],
) -> Result<Settlement, RaffleError> {
    if participants.is_empty() {
        msg!("Cannot settle a round without participants");
        return Err(RaffleError::EmptyParticipantSet);
    }
    let index = winner_index(random_word, participants.len());
    Ok(Settlement {
        winner_index: index as u32,
        winner: participants[index],
        payout: pot,
    })
}

/// Moves `amount` lamports from the program-owned raffle account to the winner.
///
/// Either both balances change or neither does; the raffle account always
/// keeps its rent-exempt reserve.
pub fn pay_out(raffle_info: &AccountInfo, winner_info: &AccountInfo, amount: u64) -> ProgramResult {
    if !winner_info.is_writable {
        msg!("Winner account {} is not writable", winner_info.key);
        return Err(RaffleError::PayoutFailed.into());
    }

    let reserve = Rent::get()?.minimum_balance(raffle_info.data_len());
    let available = raffle_info.lamports().saturating_sub(reserve);
    if available < amount {
        msg!(
            "Raffle holds {} spendable lamports, cannot pay {}",
            available,
            amount
        );
        return Err(RaffleError::PayoutFailed.into());
    }

    let debited = raffle_info
        .lamports()
        .checked_sub(amount)
        .ok_or(RaffleError::PayoutFailed)?;
    let credited = winner_info
        .lamports()
        .checked_add(amount)
        .ok_or(RaffleError::PayoutFailed)?;

    **raffle_info.try_borrow_mut_lamports()? = debited;
    **winner_info.try_borrow_mut_lamports()? = credited;
    Ok(())
}

/// Random word whose numeric value is `value`.
pub fn word_from_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_value_mod_count() {
        assert_eq!(winner_index(&word_from_u64(402), 4), 2);
        assert_eq!(winner_index(&word_from_u64(1), 4), 1);
        assert_eq!(winner_index(&word_from_u64(7), 1), 0);
        assert_eq!(winner_index(&word_from_u64(u64::MAX), 10), (u64::MAX % 10) as usize);
    }

    #[test]
    fn index_uses_the_full_word() {
        // 2^64 mod 3 == 1
        let mut word = [0u8; 32];
        word[23] = 1;
        assert_eq!(winner_index(&word, 3), 1);
        // 2^255 mod 7 == 2^(255 mod 3) == 1
        let mut word = [0u8; 32];
        word[0] = 0x80;
        assert_eq!(winner_index(&word, 7), 1);
    }

    #[test]
    fn settle_pays_whole_pot() {
        let players: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        let settlement = settle(&players, 400, &word_from_u64(402)).unwrap();
        assert_eq!(
            settlement,
            Settlement {
                winner_index: 2,
                winner: players[2],
                payout: 400,
            }
        );
    }

    #[test]
    fn settle_rejects_empty_round() {
        assert_eq!(
            settle(&[], 0, &word_from_u64(1)),
            Err(RaffleError::EmptyParticipantSet)
        );
    }

    #[test]
    fn read_only_winner_is_not_paid() {
        let program_id = Pubkey::new_unique();
        let raffle_key = Pubkey::new_unique();
        let winner_key = Pubkey::new_unique();
        let mut raffle_lamports = 1_000_000_000;
        let mut winner_lamports = 5;
        let mut raffle_data = [0u8; 0];
        let mut winner_data = [0u8; 0];
        let raffle_info = AccountInfo::new(
            &raffle_key,
            false,
            true,
            &mut raffle_lamports,
            &mut raffle_data,
            &program_id,
            false,
            0,
        );
        let winner_info = AccountInfo::new(
            &winner_key,
            false,
            false,
            &mut winner_lamports,
            &mut winner_data,
            &program_id,
            false,
            0,
        );
        assert_eq!(
            pay_out(&raffle_info, &winner_info, 100),
            Err(RaffleError::PayoutFailed.into())
        );
        assert_eq!(raffle_info.lamports(), 1_000_000_000);
        assert_eq!(winner_info.lamports(), 5);
    }
}
