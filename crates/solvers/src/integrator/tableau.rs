//! Butcher tables for the Runge–Kutta family.
//!
//! Rows of `a` are lower triangular. Explicit tables store only the strictly
//! lower part; diagonally implicit tables also store the diagonal entry `γ`
//! as the last element of each row.

/// An embedded Runge–Kutta pair.
#[derive(Debug)]
pub(crate) struct Tableau {
    pub a: &'static [&'static [f64]],
    pub b: &'static [f64],
    pub b_hat: &'static [f64],
    pub c: &'static [f64],

    /// Order of the embedded solution; drives step-size control.
    pub embedded_order: u8,

    /// The last stage is `f(t + h, y_new)`.
    pub fsal: bool,
}

impl Tableau {
    pub fn stages(&self) -> usize {
        self.b.len()
    }

    /// Diagonal coefficient of an SDIRK table.
    pub fn gamma(&self) -> f64 {
        self.a[0][0]
    }
}

/// Explicit embedded pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExplicitTable {
    /// Heun–Euler 2(1).
    HeunEuler21,

    /// Bogacki–Shampine 3(2).
    #[default]
    BogackiShampine32,

    /// Dormand–Prince 5(4).
    DormandPrince54,
}

/// Singly diagonally implicit embedded pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImplicitTable {
    /// L-stable two-stage SDIRK 2(1).
    Sdirk21,

    /// Alexander's L-stable three-stage SDIRK 3(2).
    #[default]
    Alexander32,
}

impl ExplicitTable {
    pub(crate) fn tableau(self) -> &'static Tableau {
        match self {
            Self::HeunEuler21 => &HEUN_EULER,
            Self::BogackiShampine32 => &BOGACKI_SHAMPINE,
            Self::DormandPrince54 => &DORMAND_PRINCE,
        }
    }
}

impl ImplicitTable {
    pub(crate) fn tableau(self) -> &'static Tableau {
        match self {
            Self::Sdirk21 => &SDIRK21,
            Self::Alexander32 => &ALEXANDER,
        }
    }
}

/// Most stages in any table.
pub(crate) const MAX_STAGES: usize = 7;

static HEUN_EULER: Tableau = Tableau {
    a: &[&[], &[1.0]],
    b: &[0.5, 0.5],
    b_hat: &[1.0, 0.0],
    c: &[0.0, 1.0],
    embedded_order: 1,
    fsal: false,
};

static BOGACKI_SHAMPINE: Tableau = Tableau {
    a: &[&[], &[0.5], &[0.0, 0.75], &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0]],
    b: &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0, 0.0],
    b_hat: &[7.0 / 24.0, 0.25, 1.0 / 3.0, 0.125],
    c: &[0.0, 0.5, 0.75, 1.0],
    embedded_order: 2,
    fsal: true,
};

static DORMAND_PRINCE: Tableau = Tableau {
    a: &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
        &[
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
        ],
        &[
            35.0 / 384.0,
            0.0,
            500.0 / 1113.0,
            125.0 / 192.0,
            -2187.0 / 6784.0,
            11.0 / 84.0,
        ],
    ],
    b: &[
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
        0.0,
    ],
    b_hat: &[
        5179.0 / 57600.0,
        0.0,
        7571.0 / 16695.0,
        393.0 / 640.0,
        -92097.0 / 339200.0,
        187.0 / 2100.0,
        1.0 / 40.0,
    ],
    c: &[0.0, 0.2, 0.3, 0.8, 8.0 / 9.0, 1.0, 1.0],
    embedded_order: 4,
    fsal: true,
};

// γ = 1 − 1/√2
static SDIRK21: Tableau = Tableau {
    a: &[
        &[0.292_893_218_813_452_4],
        &[0.707_106_781_186_547_6, 0.292_893_218_813_452_4],
    ],
    b: &[0.707_106_781_186_547_6, 0.292_893_218_813_452_4],
    b_hat: &[1.0, 0.0],
    c: &[0.292_893_218_813_452_4, 1.0],
    embedded_order: 1,
    fsal: false,
};

// γ is the root of x³ − 3x² + 3x/2 − 1/6 in (1/6, 1/2).
static ALEXANDER: Tableau = Tableau {
    a: &[
        &[0.435_866_521_508_459],
        &[0.282_066_739_245_770_5, 0.435_866_521_508_459],
        &[
            1.208_496_649_176_01,
            -0.644_363_170_684_469_2,
            0.435_866_521_508_459,
        ],
    ],
    b: &[
        1.208_496_649_176_01,
        -0.644_363_170_684_469_2,
        0.435_866_521_508_459,
    ],
    b_hat: &[0.772_630_127_667_551, 0.227_369_872_332_448_9, 0.0],
    c: &[0.435_866_521_508_459, 0.717_933_260_754_229_5, 1.0],
    embedded_order: 2,
    fsal: false,
};
