use solana_program::pubkey::Pubkey;

use crate::raffle_state::RAFFLE_SEED;

/// Find the program derived address of the raffle created by `admin`
pub fn find_raffle_address(program_id: &Pubkey, admin: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED, admin.as_ref()], program_id)
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}
