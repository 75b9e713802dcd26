use crate::error::ModelError;
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use rayon::prelude::*;

/// Identifies one parameter slot of the network.
///
/// `Wh(k)` and `Bh(k)` are the inter-layer weight and bias feeding hidden
/// layer `k`, for `k` in `1..hidden_layers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    H0,
    Wih,
    Bih,
    Whh,
    Bhh,
    Wh(usize),
    Bh(usize),
    Who,
    Bho,
}

impl std::fmt::Display for ParamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamId::H0 => write!(f, "h0"),
            ParamId::Wih => write!(f, "Wih"),
            ParamId::Bih => write!(f, "bih"),
            ParamId::Whh => write!(f, "Whh"),
            ParamId::Bhh => write!(f, "bhh"),
            ParamId::Wh(k) => write!(f, "Wh{}", k),
            ParamId::Bh(k) => write!(f, "bh{}", k),
            ParamId::Who => write!(f, "Who"),
            ParamId::Bho => write!(f, "bho"),
        }
    }
}

/// Weight and bias feeding one hidden layer from the layer below it
#[derive(Debug, Clone, PartialEq)]
pub struct InterLayer {
    pub weight: Array2<f64>,
    pub bias: Array2<f64>,
}

/// A full set of network-shaped matrices.
///
/// The same layout serves as parameter store, gradient store and velocity
/// store, so the three always line up slot for slot.
///
/// # Fields
///
/// - `h0` - Learned initial hidden state (hidden_size, hidden_layers)
/// - `wih` / `bih` - Input to first hidden layer (hidden_size, output_size) / (hidden_size, 1)
/// - `whh` / `bhh` - Recurrent weight and bias of the recurrent layer (hidden_size, hidden_size) / (hidden_size, 1)
/// - `inter` - `inter[k - 1]` holds `Wh{k}` / `bh{k}` for k in `1..hidden_layers`
/// - `who` / `bho` - Top hidden layer to softmax output (output_size, hidden_size) / (output_size, 1)
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSet {
    pub h0: Array2<f64>,
    pub wih: Array2<f64>,
    pub bih: Array2<f64>,
    pub whh: Array2<f64>,
    pub bhh: Array2<f64>,
    pub inter: Vec<InterLayer>,
    pub who: Array2<f64>,
    pub bho: Array2<f64>,
}

impl ParamSet {
    /// Creates an all-zero set for the given architecture
    ///
    /// # Parameters
    ///
    /// - `hidden_size` - Units per hidden layer
    /// - `hidden_layers` - Number of hidden layers
    /// - `output_size` - Size of the one-hot input and of the softmax output
    ///
    /// # Returns
    ///
    /// * `ParamSet` - Zero-filled matrices of the architecture's shapes
    pub fn zeros(hidden_size: usize, hidden_layers: usize, output_size: usize) -> Self {
        let inter = (1..hidden_layers)
            .map(|_| InterLayer {
                weight: Array2::zeros((hidden_size, hidden_size)),
                bias: Array2::zeros((hidden_size, 1)),
            })
            .collect();

        ParamSet {
            h0: Array2::zeros((hidden_size, hidden_layers)),
            wih: Array2::zeros((hidden_size, output_size)),
            bih: Array2::zeros((hidden_size, 1)),
            whh: Array2::zeros((hidden_size, hidden_size)),
            bhh: Array2::zeros((hidden_size, 1)),
            inter,
            who: Array2::zeros((output_size, hidden_size)),
            bho: Array2::zeros((output_size, 1)),
        }
    }

    /// Creates a set initialised the way fresh network parameters are
    ///
    /// Weight matrices are drawn uniformly from `[-init_eps, init_eps]`; biases
    /// and the initial hidden state start at zero.
    ///
    /// # Parameters
    ///
    /// - `hidden_size` - Units per hidden layer
    /// - `hidden_layers` - Number of hidden layers
    /// - `output_size` - Size of the one-hot input and of the softmax output
    /// - `init_eps` - Half-width of the uniform initialisation range
    /// - `rng` - Random source
    ///
    /// # Returns
    ///
    /// - `Ok(ParamSet)` - Initialised parameters
    /// - `Err(ModelError::ConfigurationError)` - If `init_eps` is not positive and finite
    pub fn random<R: Rng + ?Sized>(
        hidden_size: usize,
        hidden_layers: usize,
        output_size: usize,
        init_eps: f64,
        rng: &mut R,
    ) -> Result<Self, ModelError> {
        let dist = Uniform::new_inclusive(-init_eps, init_eps).map_err(|e| {
            ModelError::ConfigurationError(format!("invalid init range {}: {}", init_eps, e))
        })?;

        let mut params = Self::zeros(hidden_size, hidden_layers, output_size);
        let mut fill = |m: &mut Array2<f64>| m.mapv_inplace(|_| dist.sample(rng));

        fill(&mut params.wih);
        fill(&mut params.whh);
        for layer in params.inter.iter_mut() {
            fill(&mut layer.weight);
        }
        fill(&mut params.who);

        Ok(params)
    }

    /// Creates a zero set with the same shapes as `self`
    pub fn zeros_like(&self) -> Self {
        let hidden_size = self.h0.nrows();
        let hidden_layers = self.h0.ncols();
        let output_size = self.who.nrows();
        Self::zeros(hidden_size, hidden_layers, output_size)
    }

    /// Number of hidden layers this set was built for
    pub fn hidden_layers(&self) -> usize {
        self.h0.ncols()
    }

    /// Parameter identifiers in canonical order
    ///
    /// The order is `h0, Wih, bih, Whh, bhh, Wh1, bh1, ..., Who, bho`. Persisted
    /// optimizer state and model checkpoints are laid out in this order.
    pub fn keys(&self) -> Vec<ParamId> {
        let mut keys = vec![
            ParamId::H0,
            ParamId::Wih,
            ParamId::Bih,
            ParamId::Whh,
            ParamId::Bhh,
        ];
        for k in 1..self.hidden_layers() {
            keys.push(ParamId::Wh(k));
            keys.push(ParamId::Bh(k));
        }
        keys.push(ParamId::Who);
        keys.push(ParamId::Bho);
        keys
    }

    /// Returns the matrix in slot `id`, or `None` for an inter-layer index out of range
    pub fn get(&self, id: ParamId) -> Option<&Array2<f64>> {
        match id {
            ParamId::H0 => Some(&self.h0),
            ParamId::Wih => Some(&self.wih),
            ParamId::Bih => Some(&self.bih),
            ParamId::Whh => Some(&self.whh),
            ParamId::Bhh => Some(&self.bhh),
            ParamId::Wh(k) => k.checked_sub(1).and_then(|i| self.inter.get(i)).map(|l| &l.weight),
            ParamId::Bh(k) => k.checked_sub(1).and_then(|i| self.inter.get(i)).map(|l| &l.bias),
            ParamId::Who => Some(&self.who),
            ParamId::Bho => Some(&self.bho),
        }
    }

    /// Mutable counterpart of [`ParamSet::get`]
    pub fn get_mut(&mut self, id: ParamId) -> Option<&mut Array2<f64>> {
        match id {
            ParamId::H0 => Some(&mut self.h0),
            ParamId::Wih => Some(&mut self.wih),
            ParamId::Bih => Some(&mut self.bih),
            ParamId::Whh => Some(&mut self.whh),
            ParamId::Bhh => Some(&mut self.bhh),
            ParamId::Wh(k) => k
                .checked_sub(1)
                .and_then(|i| self.inter.get_mut(i))
                .map(|l| &mut l.weight),
            ParamId::Bh(k) => k
                .checked_sub(1)
                .and_then(|i| self.inter.get_mut(i))
                .map(|l| &mut l.bias),
            ParamId::Who => Some(&mut self.who),
            ParamId::Bho => Some(&mut self.bho),
        }
    }

    /// Iterates `(id, matrix)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (ParamId, &Array2<f64>)> {
        let head = [
            (ParamId::H0, &self.h0),
            (ParamId::Wih, &self.wih),
            (ParamId::Bih, &self.bih),
            (ParamId::Whh, &self.whh),
            (ParamId::Bhh, &self.bhh),
        ];
        let inter = self.inter.iter().enumerate().flat_map(|(i, l)| {
            [(ParamId::Wh(i + 1), &l.weight), (ParamId::Bh(i + 1), &l.bias)]
        });
        let tail = [(ParamId::Who, &self.who), (ParamId::Bho, &self.bho)];
        head.into_iter().chain(inter).chain(tail)
    }

    /// Iterates mutable matrices in canonical order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ParamId, &mut Array2<f64>)> {
        let head = [
            (ParamId::H0, &mut self.h0),
            (ParamId::Wih, &mut self.wih),
            (ParamId::Bih, &mut self.bih),
            (ParamId::Whh, &mut self.whh),
            (ParamId::Bhh, &mut self.bhh),
        ];
        let inter = self.inter.iter_mut().enumerate().flat_map(|(i, l)| {
            [
                (ParamId::Wh(i + 1), &mut l.weight),
                (ParamId::Bh(i + 1), &mut l.bias),
            ]
        });
        let tail = [(ParamId::Who, &mut self.who), (ParamId::Bho, &mut self.bho)];
        head.into_iter().chain(inter).chain(tail)
    }

    /// Pairs every slot of `self` mutably with the same slot of `other`
    ///
    /// # Panics
    ///
    /// Panics if the two sets were built for different numbers of hidden layers.
    pub fn zip_mut_with<F>(&mut self, other: &ParamSet, mut f: F)
    where
        F: FnMut(ParamId, &mut Array2<f64>, &Array2<f64>),
    {
        assert_eq!(
            self.inter.len(),
            other.inter.len(),
            "parameter sets have different layer counts"
        );
        for ((id, mine), (_, theirs)) in self.iter_mut().zip(other.iter()) {
            f(id, mine, theirs);
        }
    }

    /// Number of slots, i.e. the length of [`ParamSet::keys`]
    pub fn num_slots(&self) -> usize {
        7 + 2 * self.inter.len()
    }

    /// Total number of scalar entries across all slots
    pub fn num_elements(&self) -> usize {
        self.iter().map(|(_, m)| m.len()).sum()
    }

    /// Sum over slots of the squared Frobenius norm, square-rooted
    pub fn global_norm(&self) -> f64 {
        let slots: Vec<&Array2<f64>> = self.iter().map(|(_, m)| m).collect();
        // per-slot sums are collected in order so the total does not depend on thread count
        let squares: Vec<f64> = slots
            .par_iter()
            .map(|m| m.iter().map(|x| x * x).sum::<f64>())
            .collect();
        squares.iter().sum::<f64>().sqrt()
    }
}
