use crate::circuit::Circuit;
use crate::cmplx;
use crate::options::PowerFlowOptions;
use num_complex::Complex64;
use sparsetools::coo::Coo;
use sparsetools::csr::CSR;

/// Bus and branch admittance matrices plus the per-branch primitive terms
/// they were scattered from. The primitives are kept because the Jacobian
/// kernels and the flow computation reuse them.
pub struct Admittances {
    /// Bus admittance matrix (nb x nb).
    pub y_bus: CSR<usize, Complex64>,

    /// Branch "from" side admittance matrix (nl x nb).
    pub y_f: CSR<usize, Complex64>,

    /// Branch "to" side admittance matrix (nl x nb).
    pub y_t: CSR<usize, Complex64>,

    /// 2x2 branch model terms, one entry per branch.
    pub yff: Vec<Complex64>,
    pub yft: Vec<Complex64>,
    pub ytf: Vec<Complex64>,
    pub ytt: Vec<Complex64>,

    /// Bus shunt admittances (p.u.).
    pub y_sh: Vec<Complex64>,
}

/// Builds the admittance matrices for the given tap module, tap angle and
/// equivalent susceptance state. Rebuilt from scratch whenever any of the
/// three change: the nonlinear dependence does not admit incremental
/// patching.
pub fn make_admittances(
    circuit: &Circuit,
    options: &PowerFlowOptions,
    tap: &[f64],
    tap_angle: &[f64],
    beq: &[f64],
) -> Admittances {
    let nb = circuit.nb();
    let nl = circuit.nl();

    // For each branch, compute the elements of the branch admittance matrix where:
    //
    //      | If |   | Yff  Yft |   | Vf |
    //      |    | = |          | * |    |
    //      | It |   | Ytf  Ytt |   | Vt |
    //
    // with the tap/converter pi-model
    //
    //      ys  = 1 / (R + jX)
    //      Yff = (ys + (G + jB)/2 + jBeq) / (k^2 m^2 vtf^2)
    //      Yft = -ys / (k m e^{-j tau} vtf vtt)
    //      Ytf = -ys / (k m e^{+j tau} vtf vtt)
    //      Ytt = (ys + (G + jB)/2) / vtt^2
    let mut y_bus = Coo::with_size(nb, nb);
    let mut y_f = Coo::with_size(nl, nb);
    let mut y_t = Coo::with_size(nl, nb);

    let mut yff = vec![Complex64::default(); nl];
    let mut yft = vec![Complex64::default(); nl];
    let mut ytf = vec![Complex64::default(); nl];
    let mut ytt = vec![Complex64::default(); nl];

    for (i, br) in circuit.branch.iter().enumerate() {
        if !br.is_on() {
            continue;
        }
        let (r, x) = br.impedance(options);
        let y_s = cmplx!(1.0) / cmplx!(r + 1e-20, x); // series admittance
        let b_c2 = cmplx!(br.br_g / 2.0, br.br_b / 2.0); // shunt admittance / 2

        let mp = br.k * tap[i];
        let tap_c = Complex64::from_polar(mp, tap_angle[i]);
        let (vtf, vtt) = (br.vtap_f, br.vtap_t);

        yff[i] = (y_s + b_c2 + cmplx!(0.0, beq[i])) / cmplx!(mp * mp * vtf * vtf);
        yft[i] = -y_s / (tap_c.conj() * vtf * vtt);
        ytf[i] = -y_s / (tap_c * vtt * vtf);
        ytt[i] = (y_s + b_c2) / cmplx!(vtt * vtt);

        let (f, t) = (br.f_bus, br.t_bus);

        y_f.push(i, f, yff[i]);
        y_f.push(i, t, yft[i]);

        y_t.push(i, f, ytf[i]);
        y_t.push(i, t, ytt[i]);

        y_bus.push(f, f, yff[i]);
        y_bus.push(f, t, yft[i]);
        y_bus.push(t, f, ytf[i]);
        y_bus.push(t, t, ytt[i]);
    }

    let y_sh: Vec<Complex64> = circuit
        .bus
        .iter()
        .map(|b| {
            if b.is_on() {
                b.y_sh(circuit.base_mva)
            } else {
                Complex64::default()
            }
        })
        .collect();

    for (i, y) in y_sh.iter().enumerate() {
        y_bus.push(i, i, *y);
    }

    Admittances {
        y_bus: y_bus.to_csr(),
        y_f: y_f.to_csr(),
        y_t: y_t.to_csr(),
        yff,
        yft,
        ytf,
        ytt,
        y_sh,
    }
}
