// Helpers for generating record identifiers.
//
// Credentials, profiles and validations use UUIDv7 so rows sort by creation
// time. Session token ids (`jti`) use v4; ordering is irrelevant there.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// Generate a new random UUIDv4.
pub fn uuidv4() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use uuid::Version;

    use super::*;

    #[test]
    fn record_ids_are_v7_and_sort_by_creation() {
        let ids: Vec<Uuid> = (0..64).map(|_| uuidv7()).collect();
        assert!(ids.iter().all(|id| id.get_version() == Some(Version::SortRand)));
        assert!(ids.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn token_ids_are_random_v4() {
        assert_eq!(uuidv4().get_version(), Some(Version::Random));
        assert_ne!(uuidv4(), uuidv4());
    }
}
