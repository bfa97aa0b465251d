/// Gender tag carried by catalog entries. Cosmetic only; it drives nothing
/// but the avatar art.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

/// A selectable cosmetic identity: a display name plus avatar art.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Character {
    pub id: u32,
    pub name: &'static str,
    pub avatar: &'static str,
    pub gender: Gender,
}

/// The static character catalog. Ids are stable; persisted records refer to
/// entries by id.
pub const CHARACTERS: &[Character] = &[
    Character {
        id: 1,
        name: "Tralalero Tralala",
        avatar: "/avatars/tralalero-tralala.png",
        gender: Gender::Male,
    },
    Character {
        id: 2,
        name: "Brr Brr Patapim",
        avatar: "/avatars/brr-brr-patapim.png",
        gender: Gender::Male,
    },
    Character {
        id: 3,
        name: "Bombardiro Crocodilo",
        avatar: "/avatars/bombardiro-crocodilo.png",
        gender: Gender::Male,
    },
    Character {
        id: 4,
        name: "Cappuccina Ballerina",
        avatar: "/avatars/cappuccina-ballerina.png",
        gender: Gender::Female,
    },
    Character {
        id: 5,
        name: "Tung Tung Tung Sahur",
        avatar: "/avatars/tung-tung-tung-sahur.png",
        gender: Gender::Male,
    },
    Character {
        id: 6,
        name: "Lirili Larila",
        avatar: "/avatars/lirili-larila.png",
        gender: Gender::Female,
    },
];

/// Look up a catalog entry by id.
pub fn find_character(id: u32) -> Option<&'static Character> {
    CHARACTERS.iter().find(|c| c.id == id)
}
