// Application layer - Use case interactors

pub mod batch;
pub mod participant_interactor;

// Re-export interactors
pub use batch::BatchRunner;
pub use participant_interactor::{ParticipantInteractor, ReconstructionSettings};
