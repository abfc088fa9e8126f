// Randomness provider adapter: oracle coordinator and Switchboard V2 VRF
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    hash::hash,
    instruction::{AccountMeta, Instruction},
    msg,
    program::invoke_signed,
    program_error::ProgramError,
    pubkey::Pubkey,
    sysvar::recent_blockhashes,
};
use switchboard_v2::VrfAccountData;

use crate::raffle_error::RaffleError;
use crate::raffle_state::{RandomnessSource, Raffle};

/// Anchor instruction name of the Switchboard randomness request
const VRF_REQUEST_RANDOMNESS: &[u8] = b"global:vrf_request_randomness";

/// Keys of the accounts Switchboard needs to accept a randomness request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwitchboardRequestKeys {
    pub vrf: Pubkey,
    pub oracle_queue: Pubkey,
    pub queue_authority: Pubkey,
    pub data_buffer: Pubkey,
    pub permission: Pubkey,
    pub escrow: Pubkey,
    pub payer_wallet: Pubkey,
    pub payer_authority: Pubkey,
    pub program_state: Pubkey,
    pub switchboard_program: Pubkey,
}

impl SwitchboardRequestKeys {
    /// Account metas in the order `PerformUpkeep` expects them after the raffle.
    pub fn to_account_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.vrf, false),
            AccountMeta::new(self.oracle_queue, false),
            AccountMeta::new_readonly(self.queue_authority, false),
            AccountMeta::new_readonly(self.data_buffer, false),
            AccountMeta::new(self.permission, false),
            AccountMeta::new(self.escrow, false),
            AccountMeta::new(self.payer_wallet, false),
            AccountMeta::new_readonly(self.payer_authority, true),
            AccountMeta::new_readonly(recent_blockhashes::id(), false),
            AccountMeta::new_readonly(self.program_state, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new_readonly(self.switchboard_program, false),
        ]
    }
}

/// Account infos matching [`SwitchboardRequestKeys::to_account_metas`]
pub struct SwitchboardRequestAccounts<'a, 'b> {
    pub vrf: &'a AccountInfo<'b>,
    pub oracle_queue: &'a AccountInfo<'b>,
    pub queue_authority: &'a AccountInfo<'b>,
    pub data_buffer: &'a AccountInfo<'b>,
    pub permission: &'a AccountInfo<'b>,
    pub escrow: &'a AccountInfo<'b>,
    pub payer_wallet: &'a AccountInfo<'b>,
    pub payer_authority: &'a AccountInfo<'b>,
    pub recent_blockhashes: &'a AccountInfo<'b>,
    pub program_state: &'a AccountInfo<'b>,
    pub token_program: &'a AccountInfo<'b>,
    pub switchboard_program: &'a AccountInfo<'b>,
}

impl<'a, 'b> SwitchboardRequestAccounts<'a, 'b> {
    pub fn next<I>(iter: &mut I) -> Result<Self, ProgramError>
    where
        I: Iterator<Item = &'a AccountInfo<'b>>,
    {
        Ok(Self {
            vrf: next_account_info(iter)?,
            oracle_queue: next_account_info(iter)?,
            queue_authority: next_account_info(iter)?,
            data_buffer: next_account_info(iter)?,
            permission: next_account_info(iter)?,
            escrow: next_account_info(iter)?,
            payer_wallet: next_account_info(iter)?,
            payer_authority: next_account_info(iter)?,
            recent_blockhashes: next_account_info(iter)?,
            program_state: next_account_info(iter)?,
            token_program: next_account_info(iter)?,
            switchboard_program: next_account_info(iter)?,
        })
    }

    pub fn keys(&self) -> SwitchboardRequestKeys {
        SwitchboardRequestKeys {
            vrf: *self.vrf.key,
            oracle_queue: *self.oracle_queue.key,
            queue_authority: *self.queue_authority.key,
            data_buffer: *self.data_buffer.key,
            permission: *self.permission.key,
            escrow: *self.escrow.key,
            payer_wallet: *self.payer_wallet.key,
            payer_authority: *self.payer_authority.key,
            program_state: *self.program_state.key,
            switchboard_program: *self.switchboard_program.key,
        }
    }
}

/// Hands out the next oracle request id. Ids are never reused.
pub fn issue_oracle_request(raffle: &mut Raffle) -> Result<u128, RaffleError> {
    match raffle.config.source {
        RandomnessSource::Oracle { .. } => {}
        RandomnessSource::Switchboard { .. } => {
            return Err(RaffleError::RandomnessSourceMismatch)
        }
    }
    let request_id = raffle.next_request_id;
    raffle.next_request_id = request_id
        .checked_add(1)
        .ok_or(RaffleError::MathOverflow)?;
    Ok(request_id)
}

/// Checks that `oracle_info` is the configured oracle and signed.
pub fn verify_oracle_signer(
    source: &RandomnessSource,
    oracle_info: &AccountInfo,
) -> Result<(), ProgramError> {
    let authority = match source {
        RandomnessSource::Oracle { authority } => authority,
        RandomnessSource::Switchboard { .. } => {
            msg!("Raffle draws randomness from Switchboard, not an oracle");
            return Err(RaffleError::RandomnessSourceMismatch.into());
        }
    };
    if !oracle_info.is_signer {
        msg!("Oracle must sign the fulfillment");
        return Err(ProgramError::MissingRequiredSignature);
    }
    if oracle_info.key != authority {
        msg!("Fulfillment signed by {}, expected {}", oracle_info.key, authority);
        return Err(RaffleError::UnauthorizedFulfiller.into());
    }
    Ok(())
}

/// Instruction data of `vrf_request_randomness`: anchor discriminator
/// followed by the permission and state bumps.
pub fn vrf_request_randomness_data(permission_bump: u8, state_bump: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(10);
    data.extend_from_slice(&hash(VRF_REQUEST_RANDOMNESS).to_bytes()[..8]);
    data.push(permission_bump);
    data.push(state_bump);
    data
}

/// Switchboard `vrf_request_randomness` with `authority` as the VRF authority.
pub fn vrf_request_randomness(
    authority: &Pubkey,
    keys: &SwitchboardRequestKeys,
    permission_bump: u8,
    state_bump: u8,
) -> Instruction {
    Instruction {
        program_id: keys.switchboard_program,
        accounts: vec![
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(keys.vrf, false),
            AccountMeta::new(keys.oracle_queue, false),
            AccountMeta::new_readonly(keys.queue_authority, false),
            AccountMeta::new_readonly(keys.data_buffer, false),
            AccountMeta::new(keys.permission, false),
            AccountMeta::new(keys.escrow, false),
            AccountMeta::new(keys.payer_wallet, false),
            AccountMeta::new_readonly(keys.payer_authority, true),
            AccountMeta::new_readonly(recent_blockhashes::id(), false),
            AccountMeta::new_readonly(keys.program_state, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: vrf_request_randomness_data(permission_bump, state_bump),
    }
}

/// Requests randomness from Switchboard, signing as the raffle PDA.
///
/// Returns the VRF counter after the request, which identifies it.
pub fn request_switchboard_randomness<'a, 'b>(
    raffle_info: &'a AccountInfo<'b>,
    accounts: &SwitchboardRequestAccounts<'a, 'b>,
    source: &RandomnessSource,
    signer_seeds: &[&[u8]],
) -> Result<u128, ProgramError> {
    let (program_id, vrf, state_bump, permission_bump) = match source {
        RandomnessSource::Switchboard {
            program_id,
            vrf,
            state_bump,
            permission_bump,
        } => (program_id, vrf, *state_bump, *permission_bump),
        RandomnessSource::Oracle { .. } => {
            msg!("Raffle draws randomness from an oracle, not Switchboard");
            return Err(RaffleError::RandomnessSourceMismatch.into());
        }
    };

    if accounts.switchboard_program.key != program_id || accounts.vrf.owner != program_id {
        msg!("Switchboard program mismatch");
        return Err(ProgramError::IncorrectProgramId);
    }
    if accounts.vrf.key != vrf {
        msg!("VRF account {} is not the configured {}", accounts.vrf.key, vrf);
        return Err(RaffleError::RandomnessSourceMismatch.into());
    }
    if *accounts.token_program.key != spl_token::id() {
        return Err(ProgramError::IncorrectProgramId);
    }
    if *accounts.recent_blockhashes.key != recent_blockhashes::id() {
        return Err(ProgramError::InvalidArgument);
    }
    if !accounts.payer_authority.is_signer {
        msg!("Payer authority must sign the VRF request");
        return Err(ProgramError::MissingRequiredSignature);
    }

    let ix = vrf_request_randomness(
        raffle_info.key,
        &accounts.keys(),
        permission_bump,
        state_bump,
    );
    invoke_signed(
        &ix,
        &[
            raffle_info.clone(),
            accounts.vrf.clone(),
            accounts.oracle_queue.clone(),
            accounts.queue_authority.clone(),
            accounts.data_buffer.clone(),
            accounts.permission.clone(),
            accounts.escrow.clone(),
            accounts.payer_wallet.clone(),
            accounts.payer_authority.clone(),
            accounts.recent_blockhashes.clone(),
            accounts.program_state.clone(),
            accounts.token_program.clone(),
            accounts.switchboard_program.clone(),
        ],
        &[signer_seeds],
    )?;

    let vrf_data = VrfAccountData::new(accounts.vrf).map_err(|_| ProgramError::InvalidAccountData)?;
    let counter = vrf_data.counter;
    msg!("VRF randomness requested, counter {}", counter);
    Ok(counter)
}

/// Reads the verified result of the configured VRF account.
///
/// Returns the counter of the request it answers and the random word.
pub fn read_vrf_result(
    source: &RandomnessSource,
    vrf_info: &AccountInfo,
) -> Result<(u128, [u8; 32]), ProgramError> {
    let (program_id, vrf) = match source {
        RandomnessSource::Switchboard {
            program_id, vrf, ..
        } => (program_id, vrf),
        RandomnessSource::Oracle { .. } => {
            msg!("Raffle draws randomness from an oracle, not Switchboard");
            return Err(RaffleError::RandomnessSourceMismatch.into());
        }
    };
    if vrf_info.owner != program_id {
        msg!("VRF account not owned by Switchboard program");
        return Err(ProgramError::InvalidAccountOwner);
    }
    if vrf_info.key != vrf {
        msg!("VRF account {} is not the configured {}", vrf_info.key, vrf);
        return Err(RaffleError::RandomnessSourceMismatch.into());
    }

    let vrf_data = VrfAccountData::new(vrf_info).map_err(|_| ProgramError::InvalidAccountData)?;
    let result = vrf_data
        .get_result()
        .map_err(|_| RaffleError::RandomnessNotReady)?;
    if result == [0u8; 32] {
        msg!("VRF account does not have a result yet");
        return Err(RaffleError::RandomnessNotReady.into());
    }
    Ok((vrf_data.counter, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raffle_state::{ProviderParams, RaffleConfig};

    fn raffle_with(source: RandomnessSource) -> Raffle {
        let config = RaffleConfig {
            entry_fee: 1,
            interval: 0,
            max_players: 4,
            source,
            params: ProviderParams::default(),
        };
        Raffle::new(Pubkey::new_unique(), 0, config, 0)
    }

    #[test]
    fn oracle_ids_are_sequential_and_fresh() {
        let mut raffle = raffle_with(RandomnessSource::Oracle {
            authority: Pubkey::new_unique(),
        });
        assert_eq!(issue_oracle_request(&mut raffle), Ok(1));
        assert_eq!(issue_oracle_request(&mut raffle), Ok(2));
        assert_eq!(raffle.next_request_id, 3);
    }

    #[test]
    fn switchboard_raffle_issues_no_oracle_ids() {
        let mut raffle = raffle_with(RandomnessSource::Switchboard {
            program_id: Pubkey::new_unique(),
            vrf: Pubkey::new_unique(),
            state_bump: 1,
            permission_bump: 2,
        });
        assert_eq!(
            issue_oracle_request(&mut raffle),
            Err(RaffleError::RandomnessSourceMismatch)
        );
    }

    #[test]
    fn oracle_signer_must_match() {
        let authority = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let source = RandomnessSource::Oracle { authority };

        let mut lamports = 0;
        let mut data = [0u8; 0];
        let impostor = AccountInfo::new(&other, true, false, &mut lamports, &mut data, &owner, false, 0);
        assert_eq!(
            verify_oracle_signer(&source, &impostor),
            Err(RaffleError::UnauthorizedFulfiller.into())
        );

        let mut lamports = 0;
        let mut data = [0u8; 0];
        let unsigned = AccountInfo::new(&authority, false, false, &mut lamports, &mut data, &owner, false, 0);
        assert_eq!(
            verify_oracle_signer(&source, &unsigned),
            Err(ProgramError::MissingRequiredSignature)
        );

        let mut lamports = 0;
        let mut data = [0u8; 0];
        let oracle = AccountInfo::new(&authority, true, false, &mut lamports, &mut data, &owner, false, 0);
        assert_eq!(verify_oracle_signer(&source, &oracle), Ok(()));
    }

    #[test]
    fn request_instruction_layout() {
        let authority = Pubkey::new_unique();
        let keys = SwitchboardRequestKeys {
            vrf: Pubkey::new_unique(),
            oracle_queue: Pubkey::new_unique(),
            queue_authority: Pubkey::new_unique(),
            data_buffer: Pubkey::new_unique(),
            permission: Pubkey::new_unique(),
            escrow: Pubkey::new_unique(),
            payer_wallet: Pubkey::new_unique(),
            payer_authority: Pubkey::new_unique(),
            program_state: Pubkey::new_unique(),
            switchboard_program: Pubkey::new_unique(),
        };
        let ix = vrf_request_randomness(&authority, &keys, 7, 9);

        assert_eq!(ix.program_id, keys.switchboard_program);
        assert_eq!(ix.accounts.len(), 12);
        assert_eq!(ix.accounts[0], AccountMeta::new_readonly(authority, true));
        assert_eq!(ix.accounts[1], AccountMeta::new(keys.vrf, false));
        assert_eq!(ix.accounts[11].pubkey, spl_token::id());
        assert_eq!(&ix.data[..8], &hash(VRF_REQUEST_RANDOMNESS).to_bytes()[..8]);
        assert_eq!(&ix.data[8..], &[7, 9]);
    }
}
