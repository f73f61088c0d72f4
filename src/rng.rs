// SPDX-FileCopyrightText: 2024 ScribbleLab Contributors
//
// SPDX-License-Identifier: Apache-2.0

use std::cell::RefCell;

use rand::{thread_rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::{self, Result};

thread_local! {
    static RNG: RefCell<Option<ChaCha20Rng>> = RefCell::new(None);
}

/// Runs `f` with the thread's key-generation RNG, seeding it from the
/// operating system on first use.
pub(crate) fn map<F, R>(mut f: F) -> Result<R>
where
    F: FnMut(&mut ChaCha20Rng) -> R,
{
    RNG.with(|cell| -> Result<R> {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(
                ChaCha20Rng::from_rng(thread_rng()).map_err(|_| error::Crypto::KeyGeneration)?,
            );
        }
        match slot.as_mut() {
            Some(rng) => Ok(f(rng)),
            None => Err(error::Crypto::KeyGeneration.into()),
        }
    })
}

#[cfg(test)]
mod tests {
    use rand::RngCore;

    use super::*;

    #[test]
    fn successive_draws_differ() -> Result<()> {
        let a = map(|rng| rng.next_u64())?;
        let b = map(|rng| rng.next_u64())?;
        assert_ne!(a, b);
        Ok(())
    }
}
