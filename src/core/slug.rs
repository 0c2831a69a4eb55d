use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashSet;

const ADJECTIVES: &[&str] = &[
    "swift", "bright", "calm", "bold", "cool", "warm", "wild", "quiet", "rapid", "smooth",
    "sharp", "light", "dark", "quick", "brave",
];

const NOUNS: &[&str] = &[
    "wave", "star", "wind", "fire", "moon", "sun", "bird", "fish", "tree", "flow", "path",
    "beam", "spark", "drop", "leaf",
];

const MAX_ATTEMPTS: usize = 100;

/// Allocates short readable session identifiers like `calm-moon-512`
///
/// Identifiers stay reserved until [`release`](Self::release) is called.
#[derive(Debug, Default)]
pub struct SlugGenerator {
    in_use: HashSet<String>,
}

impl SlugGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve and return an identifier that is not currently in use
    pub fn generate(&mut self) -> String {
        let mut rng = rand::rng();

        for _ in 0..MAX_ATTEMPTS {
            let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("swift");
            let noun = NOUNS.choose(&mut rng).copied().unwrap_or("drop");
            let number: u16 = rng.random_range(100..1000);
            let slug = format!("{}-{}-{}", adjective, noun, number);

            if self.in_use.insert(slug.clone()) {
                return slug;
            }
        }

        self.fallback()
    }

    /// Time-derived identifier, used once the random space keeps colliding
    fn fallback(&mut self) -> String {
        let base = format!("drop-{}", chrono::Utc::now().timestamp_millis());
        let mut slug = base.clone();
        let mut suffix = 1u32;
        while !self.in_use.insert(slug.clone()) {
            slug = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        tracing::debug!("Slug space exhausted, using fallback {}", slug);
        slug
    }

    /// Make `slug` available again; unknown identifiers are ignored
    pub fn release(&mut self, slug: &str) {
        self.in_use.remove(slug);
    }

    pub fn is_in_use(&self, slug: &str) -> bool {
        self.in_use.contains(slug)
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }

    pub fn clear(&mut self) {
        self.in_use.clear();
    }
}
