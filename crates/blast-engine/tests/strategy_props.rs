//! Property tests over the distribution strategies

use blast_core::{BlastRadius, EngineConfig, SeededRng};
use blast_engine::Distributor;
use blast_test_utils::{FakeMemory, StubGenerator};
use proptest::prelude::*;

fn setup(names: &[String]) -> FakeMemory {
    let mut mem = FakeMemory::new();
    for (i, name) in names.iter().enumerate() {
        mem = mem.with_domain(name, 0x80 + i * 0x40);
    }
    mem
}

fn domain_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("dom{i}")).collect()
}

proptest! {
    #[test]
    fn spread_count_equals_intensity(
        intensity in 1u64..200,
        domain_count in 1usize..5,
        seed in any::<u64>(),
    ) {
        let names = domain_names(domain_count);
        let mem = setup(&names);
        let config = EngineConfig {
            intensity,
            radius: BlastRadius::Spread,
            precision: 1,
            alignment: 0,
        };
        let mut dist = Distributor::new(
            config,
            Box::new(StubGenerator::new()),
            Box::new(SeededRng::from_seed(seed)),
        );

        let layer = dist.generate(&mem, &names, None).unwrap().unwrap();
        prop_assert_eq!(layer.len() as u64, intensity);
        for unit in &layer {
            prop_assert!(names.contains(&unit.domain));
        }
    }

    #[test]
    fn even_gives_every_domain_the_same_share(
        intensity in 1u64..200,
        domain_count in 1usize..5,
        seed in any::<u64>(),
    ) {
        let names = domain_names(domain_count);
        let mem = setup(&names);
        let config = EngineConfig {
            intensity,
            radius: BlastRadius::Even,
            precision: 1,
            alignment: 0,
        };
        let mut dist = Distributor::new(
            config,
            Box::new(StubGenerator::new()),
            Box::new(SeededRng::from_seed(seed)),
        );

        let per_domain = intensity / domain_count as u64;
        match dist.generate(&mem, &names, None).unwrap() {
            Some(layer) => {
                prop_assert_eq!(layer.len() as u64, per_domain * domain_count as u64);
                for name in &names {
                    let count = layer.iter().filter(|u| &u.domain == name).count() as u64;
                    prop_assert_eq!(count, per_domain);
                }
            }
            None => prop_assert_eq!(per_domain, 0),
        }
    }

    #[test]
    fn generation_is_deterministic_for_a_seed(
        intensity in 1u64..100,
        seed in any::<u64>(),
    ) {
        let names = domain_names(3);
        let mem = setup(&names);
        let config = EngineConfig {
            intensity,
            radius: BlastRadius::Spread,
            precision: 1,
            alignment: 0,
        };

        let mut a = Distributor::new(
            config.clone(),
            Box::new(StubGenerator::new()),
            Box::new(SeededRng::from_seed(seed)),
        );
        let mut b = Distributor::new(
            config,
            Box::new(StubGenerator::new()),
            Box::new(SeededRng::from_seed(seed)),
        );

        let first = a.generate(&mem, &names, None).unwrap();
        let second = b.generate(&mem, &names, None).unwrap();
        prop_assert_eq!(first, second);
    }
}
