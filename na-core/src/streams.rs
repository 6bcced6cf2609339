//! Per-member random streams.
//!
//! Every ensemble member owns one generator, seeded from the run seed, a
//! purpose salt, and the member index. A member's draws therefore do not
//! depend on how members are scheduled across threads.

use rand::SeedableRng;

pub type Rng = ::rand_isaac::Isaac64Rng;

/// Salt for initial-ensemble sampling and process noise.
pub const MEMBERS: u64 = 0x6d65_6d62_6572_7300;
/// Salt for observation noise and observation perturbations.
pub const OBSERVATIONS: u64 = 0x6f62_7365_7276_6500;
/// Filter-side counterparts of `MEMBERS` and `OBSERVATIONS`, so a filter
/// seeded like the truth run never replays the truth's draws.
pub const FILTER_MEMBERS: u64 = 0x6669_6c74_6d65_6d00;
pub const FILTER_OBSERVATIONS: u64 = 0x6669_6c74_6f62_7300;

fn splitmix64(mut z: u64) -> u64 {
  z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
  z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
  z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
  z ^ (z >> 31)
}

pub fn member_seed(seed: u64, salt: u64, member: usize) -> u64 {
  splitmix64(seed ^ splitmix64(salt ^ splitmix64(member as u64)))
}

#[derive(Debug, Clone)]
pub struct Streams {
  rngs: Vec<Rng>,
}

impl Streams {
  pub fn derive(seed: u64, salt: u64, count: usize) -> Streams {
    Streams {
      rngs: (0..count)
        .map(|i| Rng::seed_from_u64(member_seed(seed, salt, i)))
        .collect(),
    }
  }
  pub fn members(seed: u64, count: usize) -> Streams {
    Streams::derive(seed, MEMBERS, count)
  }
  pub fn observations(seed: u64, count: usize) -> Streams {
    Streams::derive(seed, OBSERVATIONS, count)
  }
  pub fn filter_members(seed: u64, count: usize) -> Streams {
    Streams::derive(seed, FILTER_MEMBERS, count)
  }
  pub fn filter_observations(seed: u64, count: usize) -> Streams {
    Streams::derive(seed, FILTER_OBSERVATIONS, count)
  }

  pub fn len(&self) -> usize { self.rngs.len() }
  pub fn is_empty(&self) -> bool { self.rngs.is_empty() }
  pub fn get_mut(&mut self, i: usize) -> Option<&mut Rng> { self.rngs.get_mut(i) }
  pub fn as_mut_slice(&mut self) -> &mut [Rng] { &mut self.rngs[..] }
}
