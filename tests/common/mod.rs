#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// One recorded row of specnum_output.txt
pub struct Row {
    pub nevents: u64,
    pub time: f64,
    pub energy: f64,
    pub surface: Vec<u64>,
    pub gas: Vec<i64>,
}

pub struct RunSpec<'a> {
    pub temperature: f64,
    pub pressure: f64,
    pub gas: &'a [&'a str],
    /// (name without '*', dentation)
    pub surface: &'a [(&'a str, u32)],
    pub n_sites: u64,
    pub area: f64,
    pub rows: Vec<Row>,
}

pub fn write_simulation_input(dir: &Path, spec: &RunSpec<'_>) {
    let n_gas = spec.gas.len();
    let mut text = String::new();
    writeln!(text, "random_seed         1609").unwrap();
    writeln!(text, "temperature         {}", spec.temperature).unwrap();
    writeln!(text, "pressure            {}", spec.pressure).unwrap();
    writeln!(text).unwrap();
    writeln!(text, "n_gas_species       {}", n_gas).unwrap();
    writeln!(text, "gas_specs_names     {}", spec.gas.join(" ")).unwrap();
    writeln!(text, "gas_energies        {}", vec!["0.0"; n_gas].join(" ")).unwrap();
    writeln!(text, "gas_molec_weights   {}", vec!["28.0"; n_gas].join(" ")).unwrap();
    writeln!(text, "gas_molar_fracs     {}", vec!["0.5"; n_gas].join(" ")).unwrap();
    writeln!(text).unwrap();
    writeln!(text, "n_surf_species      {}", spec.surface.len()).unwrap();
    let names: Vec<String> = spec
        .surface
        .iter()
        .map(|(n, d)| format!("{}{}", n, "*".repeat(*d as usize)))
        .collect();
    writeln!(text, "surf_specs_names    {}", names.join(" ")).unwrap();
    let dents: Vec<String> = spec.surface.iter().map(|(_, d)| d.to_string()).collect();
    writeln!(text, "surf_specs_dent     {}", dents.join(" ")).unwrap();
    writeln!(text).unwrap();
    writeln!(text, "snapshots           on event 1000").unwrap();
    writeln!(text, "species_numbers     on time 1.0").unwrap();
    writeln!(text, "max_time            infinity").unwrap();
    writeln!(text, "\nfinish").unwrap();
    fs::write(dir.join("simulation_input.dat"), text).unwrap();
}

pub fn write_general_output(dir: &Path, spec: &RunSpec<'_>) {
    let text = format!(
        "\
+---------------------------------------------------+
|                  ZACROS 3.01                      |
+---------------------------------------------------+

Lattice setup:
    Lattice surface area: {area}
    Total number of lattice sites: {sites}
    Site type names and total number of sites of that type:
      StTp1 ({sites})

    Maximum coordination number: 6
",
        area = spec.area,
        sites = spec.n_sites
    );
    fs::write(dir.join("general_output.txt"), text).unwrap();
}

pub fn write_specnum(dir: &Path, spec: &RunSpec<'_>) {
    let mut text = String::from("Entry Nevents Time Temperature Energy");
    for (name, dent) in spec.surface {
        write!(text, " {}{}", name, "*".repeat(*dent as usize)).unwrap();
    }
    for gas in spec.gas {
        write!(text, " {}", gas).unwrap();
    }
    text.push('\n');
    for (i, row) in spec.rows.iter().enumerate() {
        write!(
            text,
            "{} {} {:.10E} {} {:.10E}",
            i + 1,
            row.nevents,
            row.time,
            spec.temperature,
            row.energy
        )
        .unwrap();
        for s in &row.surface {
            write!(text, " {}", s).unwrap();
        }
        for g in &row.gas {
            write!(text, " {}", g).unwrap();
        }
        text.push('\n');
    }
    fs::write(dir.join("specnum_output.txt"), text).unwrap();
}

/// Write every record of a default-lattice run into `dir`
pub fn write_run(dir: &Path, spec: &RunSpec<'_>) {
    fs::create_dir_all(dir).unwrap();
    write_simulation_input(dir, spec);
    write_general_output(dir, spec);
    write_specnum(dir, spec);
    fs::write(
        dir.join("lattice_input.dat"),
        "lattice default_choice\n  hexagonal_periodic 2.77 10 10\nend_lattice\n",
    )
    .unwrap();
}

/// Three-row CO run: 10 sites, area 10, CO* reaches 5, CO gas grows by 50 per 10 s
pub fn co_run() -> RunSpec<'static> {
    RunSpec {
        temperature: 500.0,
        pressure: 1.0,
        gas: &["CO"],
        surface: &[("CO", 1)],
        n_sites: 10,
        area: 10.0,
        rows: vec![
            Row { nevents: 0, time: 0.0, energy: 1.0, surface: vec![0], gas: vec![0] },
            Row { nevents: 100, time: 10.0, energy: 1.0, surface: vec![5], gas: vec![50] },
            Row { nevents: 200, time: 20.0, energy: 1.0, surface: vec![5], gas: vec![100] },
        ],
    }
}

/// Long run with time linear in events and energy drifting by `energy_rate` eV/Å² per event
pub fn linear_run(n: usize, energy_rate: f64) -> RunSpec<'static> {
    let area = 100.0;
    let rows = (0..n)
        .map(|i| {
            let nevents = i as u64 * 1000;
            Row {
                nevents,
                time: nevents as f64 * 1e-3,
                energy: (-50.0 + nevents as f64 * energy_rate) * area,
                surface: vec![20, 10],
                gas: vec![-(i as i64) * 4, -(i as i64) * 2, i as i64 * 4],
            }
        })
        .collect();
    RunSpec {
        temperature: 600.0,
        pressure: 2.0,
        gas: &["CO", "O2", "CO2"],
        surface: &[("CO", 1), ("O", 1)],
        n_sites: 100,
        area,
        rows,
    }
}
