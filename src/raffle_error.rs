use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError, program_error::ProgramError,
};
use thiserror::Error;

/// Errors that may be returned by the Raffle program.
///
/// The discriminant of each variant is the `ProgramError::Custom` code seen by
/// clients, so variants are only ever appended.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstructionData,

    /// Raffle account already holds an initialized raffle
    #[error("Raffle already initialized")]
    AlreadyInitialized,

    /// Raffle account has not been initialized
    #[error("Raffle not initialized")]
    NotInitialized,

    /// Configuration values rejected at initialization
    #[error("Invalid raffle configuration")]
    InvalidConfig,

    /// Entry amount is below the entry fee
    #[error("Not enough lamports sent to enter the raffle")]
    InsufficientFee,

    /// Entry amount is above the entry fee
    #[error("Entry amount must equal the entry fee")]
    Overpayment,

    /// Entries are only accepted while the raffle is open
    #[error("Raffle is not open")]
    RoundNotOpen,

    /// The raffle account has no room for another participant
    #[error("Raffle is full")]
    RaffleFull,

    /// A draw was triggered while the raffle was not eligible
    #[error("Upkeep not needed")]
    UpkeepNotNeeded,

    /// Fulfillment for a request id that is not the pending one
    #[error("Unknown or already fulfilled randomness request")]
    UnknownRequest,

    /// Settlement was attempted with no participants
    #[error("No participants to select a winner from")]
    EmptyParticipantSet,

    /// Transferring the pot to the winner failed
    #[error("Payout to winner failed")]
    PayoutFailed,

    /// The winner account passed does not match the selected participant
    #[error("Winner account does not match the selected participant")]
    WinnerAccountMismatch,

    /// The signer is not the configured randomness oracle
    #[error("Fulfillment not signed by the randomness oracle")]
    UnauthorizedFulfiller,

    /// The instruction does not match the configured randomness source
    #[error("Randomness source mismatch")]
    RandomnessSourceMismatch,

    /// The VRF account holds no result yet
    #[error("Randomness not ready")]
    RandomnessNotReady,

    /// Arithmetic overflow
    #[error("Math overflow")]
    MathOverflow,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
