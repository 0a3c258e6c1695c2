use phf::{Map, Set, phf_map, phf_set};

static ATOMIC_NUMBERS: Map<&'static str, u8> = phf_map! {
    "H" => 1, "He" => 2, "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7, "O" => 8,
    "F" => 9, "Ne" => 10, "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15,
    "S" => 16, "Cl" => 17, "Ar" => 18, "K" => 19, "Ca" => 20, "Sc" => 21, "Ti" => 22,
    "V" => 23, "Cr" => 24, "Mn" => 25, "Fe" => 26, "Co" => 27, "Ni" => 28, "Cu" => 29,
    "Zn" => 30, "Ga" => 31, "Ge" => 32, "As" => 33, "Se" => 34, "Br" => 35, "Kr" => 36,
    "Rb" => 37, "Sr" => 38, "Y" => 39, "Zr" => 40, "Nb" => 41, "Mo" => 42, "Tc" => 43,
    "Ru" => 44, "Rh" => 45, "Pd" => 46, "Ag" => 47, "Cd" => 48, "In" => 49, "Sn" => 50,
    "Sb" => 51, "Te" => 52, "I" => 53, "Xe" => 54, "Cs" => 55, "Ba" => 56, "La" => 57,
    "Ce" => 58, "Pr" => 59, "Nd" => 60, "Pm" => 61, "Sm" => 62, "Eu" => 63, "Gd" => 64,
    "Tb" => 65, "Dy" => 66, "Ho" => 67, "Er" => 68, "Tm" => 69, "Yb" => 70, "Lu" => 71,
    "Hf" => 72, "Ta" => 73, "W" => 74, "Re" => 75, "Os" => 76, "Ir" => 77, "Pt" => 78,
    "Au" => 79, "Hg" => 80, "Tl" => 81, "Pb" => 82, "Bi" => 83, "Po" => 84, "At" => 85,
    "Rn" => 86,
};

static SYMBOLS: [&str; 87] = [
    "*", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
    "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd",
    "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn",
];

/// Elements that may be written without brackets.
static ORGANIC_SUBSET: Set<&'static str> = phf_set! {
    "B", "C", "N", "O", "P", "S", "F", "Cl", "Br", "I",
};

/// Elements that may appear in lowercase aromatic form.
static AROMATIC_CAPABLE: Set<&'static str> = phf_set! {
    "B", "C", "N", "O", "P", "S", "As", "Se", "Te",
};

pub fn atomic_number(symbol: &str) -> Option<u8> {
    ATOMIC_NUMBERS.get(symbol).copied()
}

/// Returns the element symbol, with `"*"` for atomic number zero.
pub fn symbol(atomic_num: u8) -> Option<&'static str> {
    SYMBOLS.get(atomic_num as usize).copied()
}

pub fn is_organic_subset(atomic_num: u8) -> bool {
    symbol(atomic_num).is_some_and(|s| ORGANIC_SUBSET.contains(s))
}

pub fn can_be_aromatic(atomic_num: u8) -> bool {
    symbol(atomic_num).is_some_and(|s| AROMATIC_CAPABLE.contains(s))
}

/// Standard valences used to derive implicit hydrogens of bare organic atoms.
pub fn default_valences(atomic_num: u8) -> &'static [u8] {
    match atomic_num {
        5 => &[3],
        6 => &[4],
        7 => &[3, 5],
        8 => &[2],
        15 => &[3, 5],
        16 => &[2, 4, 6],
        9 | 17 | 35 | 53 => &[1],
        _ => &[],
    }
}

/// Implicit hydrogen count of a bare (unbracketed) atom.
///
/// The count fills the bond-order sum up to the lowest standard valence that
/// accommodates it; aromatic atoms donate one valence to the π system.
pub fn implicit_hydrogens(atomic_num: u8, bond_order_sum: u8, is_aromatic: bool) -> u8 {
    let Some(&target) = default_valences(atomic_num)
        .iter()
        .find(|&&valence| valence >= bond_order_sum)
    else {
        return 0;
    };
    let hydrogens = target - bond_order_sum;
    if is_aromatic {
        hydrogens.saturating_sub(1)
    } else {
        hydrogens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_and_atomic_number_agree() {
        for n in 1..=86u8 {
            let s = symbol(n).unwrap();
            assert_eq!(atomic_number(s), Some(n), "symbol {s}");
        }
        assert_eq!(symbol(0), Some("*"));
        assert_eq!(symbol(87), None);
    }

    #[test]
    fn organic_subset_membership() {
        assert!(is_organic_subset(6));
        assert!(is_organic_subset(17));
        assert!(!is_organic_subset(1));
        assert!(!is_organic_subset(26));
    }

    #[test]
    fn implicit_hydrogens_follow_standard_valences() {
        assert_eq!(implicit_hydrogens(6, 1, false), 3);
        assert_eq!(implicit_hydrogens(6, 2, true), 1);
        assert_eq!(implicit_hydrogens(6, 3, true), 0);
        assert_eq!(implicit_hydrogens(7, 2, true), 0);
        assert_eq!(implicit_hydrogens(7, 4, false), 1);
        assert_eq!(implicit_hydrogens(16, 3, false), 1);
        assert_eq!(implicit_hydrogens(9, 2, false), 0);
        assert_eq!(implicit_hydrogens(26, 0, false), 0);
    }
}
