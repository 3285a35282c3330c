use num_integer::Roots;
use num_traits::{One, PrimInt, Zero};

pub fn primitive_root(prime: u64) -> Option<u64> {
    let test_exponents: Vec<u64> = distinct_prime_factors(prime - 1)
        .iter()
        .map(|factor| (prime - 1) / factor)
        .collect();
    'next: for potential_root in 2..prime {
        // for each distinct factor, if potential_root^(p-1)/factor mod p is 1, reject it
        for exp in &test_exponents {
            if modular_exponent(potential_root, *exp, prime) == 1 {
                continue 'next;
            }
        }

        // if we reach this point, it means this root was not rejected, so return it
        return Some(potential_root);
    }
    None
}

/// computes base^exponent % modulo using the standard exponentiation by squaring algorithm
pub fn modular_exponent<T: PrimInt>(mut base: T, mut exponent: T, modulo: T) -> T {
    let one = T::one();

    let mut result = one;

    while exponent > Zero::zero() {
        if exponent & one == one {
            result = result * base % modulo;
        }
        exponent = exponent >> One::one();
        base = (base * base) % modulo;
    }

    result
}

/// return all of the prime factors of n, but omit duplicate prime factors
pub fn distinct_prime_factors(mut n: u64) -> Vec<u64> {
    let mut result = Vec::new();

    // handle 2 separately so we dont have to worry about adding 2 vs 1
    if n % 2 == 0 {
        while n % 2 == 0 {
            n /= 2;
        }
        result.push(2);
    }
    if n > 1 {
        let mut divisor = 3;
        let mut limit = n.sqrt() + 1;
        while divisor < limit {
            if n % divisor == 0 {
                // remove as many factors as possible from n
                while n % divisor == 0 {
                    n /= divisor;
                }
                result.push(divisor);

                // recalculate the limit to reduce the amount of work we need to do
                limit = n.sqrt() + 1;
            }

            divisor += 2;
        }

        if n > 1 {
            result.push(n);
        }
    }

    result
}

pub fn is_prime(n: usize) -> bool {
    n > 1 && primal_check::miller_rabin(n as u64)
}

/// Smallest divisor of `n` greater than one. Returns `n` itself for primes.
pub fn first_divisor(n: usize) -> usize {
    debug_assert!(n > 1);
    if n % 2 == 0 {
        return 2;
    }
    let limit = n.sqrt();
    let mut divisor = 3;
    while divisor <= limit {
        if n % divisor == 0 {
            return divisor;
        }
        divisor += 2;
    }
    n
}

pub fn largest_prime_factor(n: usize) -> usize {
    distinct_prime_factors(n as u64)
        .last()
        .map_or(n, |&factor| factor as usize)
}

/// If `n == k * q * q`, returns `q`.
pub fn sqrt_of_quotient(n: usize, k: usize) -> Option<usize> {
    if k == 0 || n % k != 0 {
        return None;
    }
    let quotient = n / k;
    let q = quotient.sqrt();
    if q * q == quotient {
        Some(q)
    } else {
        None
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_modular_exponent() {
        // make sure to test something that would overflow under ordinary circumstances
        // ie 3 ^ 416788 mod 47
        let test_list = vec![
            ((2, 8, 300), 256),
            ((2, 9, 300), 212),
            ((1, 9, 300), 1),
            ((3, 416788, 47), 8),
        ];

        for (input, expected) in test_list {
            let (base, exponent, modulo) = input;

            let result = modular_exponent(base, exponent, modulo);

            assert_eq!(result, expected);
        }
    }

    #[test]
    fn test_primitive_root() {
        let test_list = vec![(3, 2), (7, 3), (11, 2), (13, 2), (47, 5), (7919, 7)];

        for (input, expected) in test_list {
            let root = primitive_root(input).unwrap();

            assert_eq!(root, expected);
        }
    }

    #[test]
    fn test_distinct_prime_factors() {
        let test_list = vec![
            (46, vec![2, 23]),
            (2, vec![2]),
            (3, vec![3]),
            (162, vec![2, 3]),
        ];

        for (input, expected) in test_list {
            let factors = distinct_prime_factors(input);

            assert_eq!(factors, expected);
        }
    }

    #[test]
    fn test_divisors() {
        let test_list = vec![
            (2, 2, 2),
            (9, 3, 3),
            (12, 2, 3),
            (13, 13, 13),
            (35, 5, 7),
            (101, 101, 101),
            (1024, 2, 2),
        ];
        for (n, first, largest) in test_list {
            assert_eq!(first_divisor(n), first, "n = {}", n);
            assert_eq!(largest_prime_factor(n), largest, "n = {}", n);
            assert_eq!(is_prime(n), first == n, "n = {}", n);
        }
        assert!(!is_prime(1));
    }

    #[test]
    fn test_sqrt_of_quotient() {
        assert_eq!(sqrt_of_quotient(4096, 1), Some(64));
        assert_eq!(sqrt_of_quotient(8192, 2), Some(64));
        assert_eq!(sqrt_of_quotient(8192, 1), None);
        assert_eq!(sqrt_of_quotient(100, 3), None);
    }
}
