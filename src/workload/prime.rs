//! Trial-division primality, the CPU load.
//!
//! Nothing is cached between calls: every pass recomputes from scratch
//! because the work itself is the point.

/// Whether `n` is prime. Everything below 2 is not.
pub fn is_prime(n: i64) -> bool {
    n >= 2 && is_prime_unsigned(n as u64)
}

/// Count the primes in `[2, limit)`.
pub fn count_primes(limit: u64) -> u64 {
    (2..limit).filter(|&k| is_prime_unsigned(k)).count() as u64
}

fn is_prime_unsigned(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n == 2 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut i = 3;
    while i <= n / i {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMES_BELOW_100: [i64; 25] = [
        2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83,
        89, 97,
    ];

    fn sieve(limit: usize) -> Vec<bool> {
        let mut is = vec![true; limit];
        is[0] = false;
        is[1] = false;
        let mut i = 2;
        while i * i < limit {
            if is[i] {
                let mut j = i * i;
                while j < limit {
                    is[j] = false;
                    j += i;
                }
            }
            i += 1;
        }
        is
    }

    #[test]
    fn should_reject_values_below_two() {
        for n in [i64::MIN, -97, -2, -1, 0, 1] {
            assert!(!is_prime(n), "{n}");
        }
    }

    #[test]
    fn should_accept_known_primes() {
        for p in PRIMES_BELOW_100 {
            assert!(is_prime(p), "{p}");
        }
        assert!(is_prime(101));
        assert!(is_prime(997));
    }

    #[test]
    fn should_reject_known_composites() {
        for n in [4, 6, 8, 9, 10, 15, 25, 49, 100, 121, 1000, 7919 * 7919] {
            assert!(!is_prime(n), "{n}");
        }
    }

    #[test]
    fn should_treat_two_as_only_even_prime() {
        assert!(is_prime(2));
        assert!((2..500).step_by(2).skip(1).all(|n| !is_prime(n)));
    }

    #[test]
    fn should_match_sieve_up_to_1000() {
        let reference = sieve(1001);
        for n in 0..=1000 {
            assert_eq!(is_prime(n as i64), reference[n], "{n}");
        }
    }

    #[test]
    fn should_count_primes_in_half_open_range() {
        assert_eq!(count_primes(0), 0);
        assert_eq!(count_primes(2), 0);
        assert_eq!(count_primes(3), 1);
        assert_eq!(count_primes(100), 25);
        assert_eq!(count_primes(101), 25);
        assert_eq!(count_primes(102), 26);
        assert_eq!(count_primes(10_000), 1229);
    }
}
