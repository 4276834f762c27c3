// Zone -> city grouping.
//
// The export labels cases with fine-grained operational zones; analysts slice
// by city. Matching is exact and case-sensitive on the trimmed zone, so
// combined labels such as `KENNEDY GYE,N/A` have to be listed verbatim.
use once_cell::sync::Lazy;
use std::collections::HashSet;

pub const GUAYAQUIL: &str = "Guayaquil";
pub const QUITO: &str = "Quito";

static GUAYAQUIL_ZONES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "AURORA GYE",
        "CENTRO SUR GYE",
        "CENTRO SUR,Duran,N/A",
        "CENTRO SUR GYE, N/A",
        "Duran",
        "INMACONSA 2 GYE",
        "INMACONSA 2 GYE,INMACONSA GYE",
        "INMACONSA GYE",
        "KENNEDY GYE",
        "KENNEDY GYE,N/A",
        "N/A,SUR 1 GYE",
        "SUR 1 GYE",
        "SUR 1 GYE.SUR 2 GYE",
        "SUR 2 GYE",
        "MIRAFLORES GYE",
    ]
    .into_iter()
    .collect()
});

static QUITO_ZONES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ARMENIA UIO",
        "BORROMONI UIO",
        "COTOCOLLAO UIO",
        "GOSSEAL UIO",
        "MUROS UIO",
        "N/A,ZONA INDUSTRIAL UIO",
        "SUR 2 UIO",
        "ZONA INDUSTRIAL UIO",
    ]
    .into_iter()
    .collect()
});

/// Map a raw zone label to its city. Unknown zones map to themselves (trimmed).
pub fn map_city(zone: &str) -> String {
    let zone = zone.trim();
    if GUAYAQUIL_ZONES.contains(zone) {
        GUAYAQUIL.to_string()
    } else if QUITO_ZONES.contains(zone) {
        QUITO.to_string()
    } else {
        zone.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_guayaquil_zone_maps_to_guayaquil() {
        for zone in GUAYAQUIL_ZONES.iter() {
            assert_eq!(map_city(zone), GUAYAQUIL, "zone {zone}");
        }
    }

    #[test]
    fn every_quito_zone_maps_to_quito() {
        for zone in QUITO_ZONES.iter() {
            assert_eq!(map_city(zone), QUITO, "zone {zone}");
        }
    }

    #[test]
    fn input_is_trimmed_before_lookup() {
        assert_eq!(map_city("  KENNEDY GYE\t"), GUAYAQUIL);
        assert_eq!(map_city(" MUROS UIO "), QUITO);
    }

    #[test]
    fn unmapped_zones_pass_through_trimmed() {
        assert_eq!(map_city(""), "");
        assert_eq!(map_city("   "), "");
        assert_eq!(map_city(" MACHALA "), "MACHALA");
        // Case-sensitive: lower-case labels are not in the tables.
        assert_eq!(map_city("kennedy gye"), "kennedy gye");
        assert_eq!(map_city("DURAN"), "DURAN");
    }
}
