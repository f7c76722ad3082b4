//! Curated German OParl endpoints used by the `init-sources` command.
//!
//! Municipalities run a handful of council-information-system vendors
//! (SessionNet, Ratsinfomanagement, ALLRIS, Gremien) that all expose OParl
//! under slightly different paths, so the list is hand-maintained rather
//! than discovered.

pub struct SeedSource {
    pub name: &'static str,
    pub system_url: &'static str,
    pub priority: i16,
    pub category: &'static str,
}

const fn municipality(name: &'static str, system_url: &'static str, priority: i16) -> SeedSource {
    SeedSource { name, system_url, priority, category: "municipality" }
}

/// Large cities with OParl APIs that have been stable for years.
pub const MAJOR_CITIES: &[SeedSource] = &[
    municipality("Stadt Köln", "https://buergerinfo.stadt-koeln.de/oparl/system", 1),
    municipality("Stadt Bonn", "https://www.bonn.sitzung-online.de/public/oparl/system", 1),
    municipality("Landeshauptstadt Düsseldorf", "https://ris-oparl.itk-rheinland.de/Oparl/system", 1),
    municipality("Stadt Dresden", "https://oparl.dresden.de/system", 1),
    municipality("Stadt Leipzig", "https://ratsinformation.leipzig.de/allris_leipzig_public/oparl/system", 1),
    municipality("Stadt Wuppertal", "https://oparl.wuppertal.de/oparl/system", 1),
    municipality("Stadt Münster", "https://oparl.stadt-muenster.de/system", 1),
    municipality("Stadt Aachen", "https://ratsinfo.aachen.de/bi/oparl/1.0/system.asp", 1),
    municipality("Stadt Braunschweig", "https://ratsinfo.braunschweig.de/bi/oparl/1.0/system.asp", 1),
    municipality("Stadt Krefeld", "https://ris.krefeld.de/webservice/oparl/v1.1/system", 1),
    municipality("Stadt Freiburg", "https://ris.freiburg.de/oparl", 1),
    municipality("Stadt Ulm", "https://buergerinfo.ulm.de/oparl/system", 1),
    municipality("München Transparent", "https://www.muenchen-transparent.de/oparl/v1.0", 1),
];

/// Mid-sized cities and towns, priority 2 unless noted.
pub const MEDIUM_CITIES: &[SeedSource] = &[
    municipality("Stadt Hagen", "https://www.hagen.de/buergerinfo/oparl/1.0/system.asp", 2),
    municipality("Klingenstadt Solingen", "https://sdnetrim.kdvz-frechen.de/rim4957/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Castrop-Rauxel", "https://castroprauxel.gremien.info/oparl", 2),
    municipality("Stadt Herford", "https://herford.ratsinfomanagement.net/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Bergheim", "https://sdnetrim.kdvz-frechen.de/rim4800/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Pulheim", "https://sdnetrim.kdvz-frechen.de/rim4350/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Willich", "https://ris.stadt-willich.de/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Erftstadt", "https://sdnetrim.kdvz-frechen.de/rim4490/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Rheda-Wiedenbrück", "https://ratsinfo.rheda-wiedenbrueck.de/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Gronau", "https://gronau.ratsinfomanagement.net/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Erkelenz", "https://ratsinfo.erkelenz.de/bi/oparl/1.0/system.asp", 2),
    municipality("Stadt Brühl", "https://ratsinfo.bruehl.de/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Lahr/Schwarzwald", "https://lahr.ratsinfomanagement.net/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Bad Kreuznach", "https://bad-kreuznach-stadt.gremien.info/oparl/system", 2),
    municipality("Stadt Pirmasens", "https://oparl.stadt-pirmasens.de/oparl/system", 2),
    municipality("Stadt Wesseling", "https://ratsinfo.wesseling.de/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Goch", "https://ris.goch.de/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Jülich", "https://sdnetrim.kdvz-frechen.de/rim4240/webservice/oparl/v1.1/system", 2),
    municipality("Stadt Emsdetten", "https://emsdetten.ratsinfomanagement.net/webservice/oparl/v1.1/system", 2),
    municipality("Kolpingstadt Kerpen", "https://ratsinfo.stadt-kerpen.de/webservice/oparl/v1.0/system", 2),
];

/// Berlin's boroughs run their own council-information systems.
pub const BERLIN_DISTRICTS: &[SeedSource] = &[
    SeedSource { name: "Berlin Marzahn-Hellersdorf", system_url: "https://www.sitzungsdienst-marzahn-hellersdorf.de/oi/oparl/1.1/system.asp", priority: 2, category: "district" },
    SeedSource { name: "Berlin Steglitz-Zehlendorf", system_url: "https://www.sitzungsdienst-steglitz-zehlendorf.de/oi/oparl/1.0/system.asp", priority: 2, category: "district" },
    SeedSource { name: "Berlin Treptow-Köpenick", system_url: "https://www.sitzungsdienst-treptow-koepenick.de/oi/oparl/1.0/system.asp", priority: 2, category: "district" },
    SeedSource { name: "Berlin Reinickendorf", system_url: "https://www.sitzungsdienst-reinickendorf.de/oi/oparl/1.0/system.asp", priority: 2, category: "district" },
    SeedSource { name: "Berlin Pankow", system_url: "https://www.sitzungsdienst-pankow.de/oi/oparl/1.0/system.asp", priority: 2, category: "district" },
    SeedSource { name: "Berlin Lichtenberg", system_url: "https://www.sitzungsdienst-lichtenberg.de/oi/oparl/1.0/system.asp", priority: 2, category: "district" },
];

/// Rural districts (Landkreise) and one regional association.
pub const DISTRICTS: &[SeedSource] = &[
    SeedSource { name: "Landkreis Ludwigslust-Parchim", system_url: "https://www.lwl-pch.sitzung-online.de/bi/oparl/1.0/system.asp", priority: 2, category: "district" },
    SeedSource { name: "Landkreis Märkisch-Oderland", system_url: "https://ratsinfo-online.net/landkreis-mol-bi/oparl/1.0/system.asp", priority: 2, category: "district" },
    SeedSource { name: "Kreis Gütersloh", system_url: "https://sdnetrim.kdvz-frechen.de/rim4890/webservice/oparl/v1.1/system", priority: 2, category: "district" },
    SeedSource { name: "Kreis Viersen", system_url: "https://kis.kreis-viersen.de/webservice/oparl/v1.0/system", priority: 2, category: "district" },
    SeedSource { name: "Kreisverwaltung Euskirchen", system_url: "https://sdnetrim.kdvz-frechen.de/rim4520/webservice/oparl/v1.1/system", priority: 2, category: "district" },
    SeedSource { name: "Regionalverband Ruhr", system_url: "https://rvr-online.gremien.info/oparl", priority: 2, category: "district" },
];

/// Small towns and municipalities, lowest sync priority.
pub const SMALL_MUNICIPALITIES: &[SeedSource] = &[
    municipality("Eschwege", "https://rim.ekom21.de/eschwege/webservice/oparl/v1.1/system", 3),
    municipality("Stadt Enger", "https://enger.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Stadt Spenge", "https://spenge.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Stadt Vlotho", "https://vlotho.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Gemeinde Hiddenhausen", "https://hiddenhausen.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Gemeinde Kirchlengern", "https://kirchlengern.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Gemeinde Rödinghausen", "https://roedinghausen.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Gemeinde Schwalmtal", "https://ris.schwalmtal.de/webservice/oparl/v1.1/system", 3),
    municipality("Gemeinde Ladbergen", "https://ladbergen.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Gemeinde Stemwede", "https://stemwede.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Gemeinde Aldenhoven", "https://ratsinfo.aldenhoven.de/webservice/oparl/v1.1/system", 3),
    municipality("Gemeinde Nettersheim", "https://sdnetrim.kdvz-frechen.de/rim4580/webservice/oparl/v1.1/system", 3),
    municipality("Stadt Olpe", "https://sitzungsdienst.kdz-ws.net/gkz330/webservice/oparl/v1.1/system", 3),
    municipality("Gemeinde Steinhagen", "https://ratsinfo.steinhagen.de/webservice/oparl/v1.1/system", 3),
    municipality("Gemeinde Langenberg", "https://ratsinfo.langenberg.de/webservice/oparl/v1.0/system", 3),
    municipality("Gemeinde Weilerswist", "https://sdnetrim.kdvz-frechen.de/rim4510/webservice/oparl/v1.1/system", 3),
    municipality("Stadt Bad Münstereifel", "https://ratsinfo.bad-muenstereifel.de/webservice/oparl/v1.1/system", 3),
    municipality("Leopoldshöhe", "https://leopoldshoehe.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Gemeinde Wachtendonk", "https://ris.wachtendonk.de/webservice/oparl/v1.1/system", 3),
    municipality("Stadt Rees", "https://sessionnet-oparl.krz.de/oparl/bodies/5205", 3),
    municipality("Stadt Bedburg", "https://sdnetrim.kdvz-frechen.de/rim4780/webservice/oparl/v1.1/system", 3),
    municipality("Aarbergen", "https://rim.ekom21.de/aarbergen/webservice/oparl/v1.1/system", 3),
    municipality("Westerburg", "https://westerburg.gremien.info/oparl/system", 3),
    municipality("Gemeinde Wallenhorst", "https://wallenhorst.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Stadt Bad Pyrmont", "https://badpyrmont.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Kronberg im Taunus", "https://kronberg.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
    municipality("Velen", "https://velen.ratsinfomanagement.net/webservice/oparl/v1.1/system", 3),
];

/// Cross-municipality OParl directories, not a single council's own system.
pub const AGGREGATORS: &[SeedSource] = &[
    SeedSource { name: "Politik bei Uns", system_url: "https://oparl.politik-bei-uns.de/system", priority: 1, category: "other" },
    SeedSource { name: "OParl Mirror", system_url: "https://mirror.oparl.org/system", priority: 2, category: "other" },
];

/// Every seed across all tiers, in priority order.
pub fn all_seeds() -> Vec<&'static SeedSource> {
    MAJOR_CITIES
        .iter()
        .chain(MEDIUM_CITIES)
        .chain(BERLIN_DISTRICTS)
        .chain(DISTRICTS)
        .chain(SMALL_MUNICIPALITIES)
        .chain(AGGREGATORS)
        .collect()
}

/// Seeds at a given priority tier (1 = high, 2 = medium, 3 = low).
pub fn seeds_by_priority(priority: i16) -> Vec<&'static SeedSource> {
    all_seeds().into_iter().filter(|s| s.priority == priority).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_seed_url_is_https() {
        for seed in all_seeds() {
            assert!(seed.system_url.starts_with("https://"), "{} has a non-https URL", seed.name);
        }
    }

    #[test]
    fn priority_1_is_nonempty() {
        assert!(!seeds_by_priority(1).is_empty());
    }

    #[test]
    fn priority_filter_matches_tier() {
        for seed in seeds_by_priority(3) {
            assert_eq!(seed.priority, 3);
        }
    }
}
