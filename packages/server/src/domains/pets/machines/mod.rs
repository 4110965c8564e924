//! Pet status machine - pure transition rules
//!
//! The table below is the only authority on which status moves are legal.
//! Business gates that need stored state (the vet release for
//! `medical_hold -> available`) are enforced by the activities before they
//! call into here.

use crate::common::CoreError;
use crate::domains::pets::models::PetStatus;

/// Legal successors for each pet status.
pub fn successors(from: PetStatus) -> &'static [PetStatus] {
    use PetStatus::*;

    match from {
        Intake => &[MedicalHold, Available, Deceased],
        MedicalHold => &[Available, Deceased],
        Available => &[Meet, Adopted, Fostered, MedicalHold, Transferred, Deceased],
        Meet => &[Available, Adopted, MedicalHold],
        Adopted => &[Returned],
        Returned => &[Intake, MedicalHold, Available],
        Fostered => &[Available, Adopted, MedicalHold, Deceased],
        Transferred => &[Intake],
        Deceased => &[],
    }
}

pub fn can_transition(from: PetStatus, to: PetStatus) -> bool {
    successors(from).contains(&to)
}

pub fn validate_transition(from: PetStatus, to: PetStatus) -> Result<(), CoreError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::invalid_transition("pet", from, to))
    }
}

/// Whether the move needs an approved vet release first.
pub fn requires_vet_release(from: PetStatus, to: PetStatus) -> bool {
    from == PetStatus::MedicalHold && to == PetStatus::Available
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_transition_matches_table_for_every_pair() {
        for from in PetStatus::ALL {
            for to in PetStatus::ALL {
                assert_eq!(
                    can_transition(from, to),
                    successors(from).contains(&to),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn deceased_is_terminal() {
        assert!(successors(PetStatus::Deceased).is_empty());
        for to in PetStatus::ALL {
            assert!(!can_transition(PetStatus::Deceased, to));
        }
    }

    #[test]
    fn no_status_transitions_to_itself() {
        for status in PetStatus::ALL {
            assert!(!can_transition(status, status), "{}", status);
        }
    }

    #[test]
    fn invalid_transition_reports_from_and_to() {
        let err = validate_transition(PetStatus::Adopted, PetStatus::Available).unwrap_err();
        match err {
            CoreError::InvalidTransition { entity, from, to } => {
                assert_eq!(entity, "pet");
                assert_eq!(from, "adopted");
                assert_eq!(to, "available");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn only_medical_release_needs_the_vet() {
        assert!(requires_vet_release(PetStatus::MedicalHold, PetStatus::Available));
        assert!(!requires_vet_release(PetStatus::Intake, PetStatus::Available));
        assert!(!requires_vet_release(PetStatus::MedicalHold, PetStatus::Deceased));
    }
}
