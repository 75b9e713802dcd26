use super::*;

#[test]
fn canonical_order_lists_every_slot() {
    let params = ParamSet::zeros(4, 3, 2);
    let names: Vec<String> = params.keys().iter().map(|id| id.to_string()).collect();

    assert_eq!(
        names,
        vec!["h0", "Wih", "bih", "Whh", "bhh", "Wh1", "bh1", "Wh2", "bh2", "Who", "bho"]
    );
    assert_eq!(params.num_slots(), names.len());

    let iter_ids: Vec<ParamId> = params.iter().map(|(id, _)| id).collect();
    assert_eq!(iter_ids, params.keys());
}

#[test]
fn shapes_follow_the_architecture() {
    let params = ParamSet::zeros(4, 3, 2);

    assert_eq!(params.h0.dim(), (4, 3));
    assert_eq!(params.wih.dim(), (4, 2));
    assert_eq!(params.bih.dim(), (4, 1));
    assert_eq!(params.whh.dim(), (4, 4));
    assert_eq!(params.get(ParamId::Wh(2)).unwrap().dim(), (4, 4));
    assert_eq!(params.get(ParamId::Bh(1)).unwrap().dim(), (4, 1));
    assert_eq!(params.who.dim(), (2, 4));
    assert_eq!(params.bho.dim(), (2, 1));

    // Wh0 and Wh3 do not exist for three layers
    assert!(params.get(ParamId::Wh(0)).is_none());
    assert!(params.get(ParamId::Bh(3)).is_none());

    assert_eq!(params.num_elements(), 12 + 8 + 4 + 16 + 4 + 2 * (16 + 4) + 8 + 2);
}

#[test]
fn single_layer_has_no_inter_layer_slots() {
    let params = ParamSet::zeros(3, 1, 2);
    assert!(params.inter.is_empty());
    assert_eq!(params.keys().len(), 7);
}

#[test]
fn random_init_is_seeded_and_bounded() {
    let mut rng_a = StdRng::seed_from_u64(11);
    let mut rng_b = StdRng::seed_from_u64(11);
    let a = ParamSet::random(5, 2, 3, 0.01, &mut rng_a).unwrap();
    let b = ParamSet::random(5, 2, 3, 0.01, &mut rng_b).unwrap();
    assert_eq!(a, b);

    for (id, m) in a.iter() {
        match id {
            ParamId::H0 | ParamId::Bih | ParamId::Bhh | ParamId::Bh(_) | ParamId::Bho => {
                assert!(m.iter().all(|&x| x == 0.0), "{} should start at zero", id)
            }
            _ => {
                assert!(m.iter().all(|&x| x.abs() <= 0.01), "{} out of range", id);
                assert!(m.iter().any(|&x| x != 0.0), "{} was not initialised", id);
            }
        }
    }

    let err = ParamSet::random(5, 2, 3, f64::NAN, &mut rng_a).unwrap_err();
    assert!(matches!(err, ModelError::ConfigurationError(_)));
}

#[test]
fn get_mut_and_zip_address_the_same_slot() {
    let mut params = ParamSet::zeros(2, 2, 2);
    params.get_mut(ParamId::Wh(1)).unwrap().fill(3.0);
    assert_eq!(params.inter[0].weight, Array2::from_elem((2, 2), 3.0));

    let mut other = params.zeros_like();
    other.zip_mut_with(&params, |_, mine, theirs| *mine += theirs);
    assert_eq!(other, params);
}

#[test]
fn global_norm_sums_over_slots() {
    let mut params = ParamSet::zeros(2, 2, 2);
    params.wih.fill(1.0); // 4 entries
    params.bho.fill(2.0); // 2 entries
    assert_relative_eq!(params.global_norm(), (4.0f64 + 8.0).sqrt(), epsilon = 1e-12);
}
