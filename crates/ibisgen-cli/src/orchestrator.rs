//! Pipeline orchestration: load, plan, simulate, derive, emit, check.

use crate::correlate;
use anyhow::{Context, Result};
use lib_analysis::{analyze_document, plan_document, AnalysisOptions};
use lib_ibis::CheckSummary;
use lib_spice::RunPolicy;
use lib_types::SpiceType;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// CLI-level options driving one conversion run.
pub struct RunOptions {
    pub config: PathBuf,
    pub outdir: PathBuf,
    pub spice_type: Option<SpiceType>,
    pub spice_cmd: Option<String>,
    pub iterate: bool,
    pub cleanup: bool,
    pub timeout: Option<Duration>,
    pub ibischk: Option<PathBuf>,
    pub correlate: bool,
}

/// Run outcome, logged at the end as the user-visible failure surface.
pub struct RunSummary {
    pub ibs_file: PathBuf,
    pub items_run: usize,
    pub items_reused: usize,
    pub failures: Vec<String>,
    pub check: Option<CheckSummary>,
}

impl RunSummary {
    pub fn log(&self) {
        tracing::info!(
            file = %self.ibs_file.display(),
            run = self.items_run,
            reused = self.items_reused,
            "emission complete"
        );
        for failure in &self.failures {
            tracing::warn!("{failure}");
        }
        if let Some(check) = &self.check {
            if !check.clean() {
                tracing::warn!(
                    errors = check.errors,
                    warnings = check.warnings,
                    "ibischk reported problems"
                );
            }
        }
    }
}

/// Execute the whole pipeline for one configuration file.
pub fn run(opts: &RunOptions) -> Result<RunSummary> {
    tracing::info!(config = %opts.config.display(), "loading configuration");
    let mut doc = lib_config::load_config(&opts.config)
        .with_context(|| format!("loading {}", opts.config.display()))?;
    if let Some(kind) = opts.spice_type {
        doc.spice_type = kind;
    }

    std::fs::create_dir_all(&opts.outdir)
        .map_err(|source| lib_config::ResourceError::OutputDir {
            path: opts.outdir.clone(),
            source,
        })
        .context("preparing output directory")?;

    let plans = plan_document(&doc).context("planning characterization")?;
    let total_items: usize = plans.iter().map(|p| p.items.len()).sum();
    tracing::info!(
        pins = plans.len(),
        items = total_items,
        simulator = doc.spice_type.name(),
        "plan ready"
    );

    let analysis_opts = AnalysisOptions {
        outdir: opts.outdir.clone(),
        config_dir: opts.config.parent().map(|p| p.to_path_buf()),
        spice_command: opts.spice_cmd.clone(),
        policy: RunPolicy {
            iterate: opts.iterate,
            cleanup: opts.cleanup,
            timeout: opts.timeout,
        },
        cancel: Arc::new(AtomicBool::new(false)),
    };
    let report =
        analyze_document(&mut doc, &plans, &analysis_opts).context("running characterization")?;

    let ibs_file = opts.outdir.join(&doc.header.file_name);
    lib_ibis::write_ibis(&doc, &ibs_file).context("emitting IBIS file")?;

    if opts.correlate {
        correlate::emit_testbenches(&doc, &plans, &analysis_opts)
            .context("emitting correlation testbenches")?;
    }

    let check = match &opts.ibischk {
        Some(checker) => Some(
            lib_ibis::run_checker(checker, &ibs_file, &opts.outdir)
                .context("running IBIS checker")?,
        ),
        None => None,
    };

    Ok(RunSummary {
        ibs_file,
        items_run: report.items_run,
        items_reused: report.items_reused,
        failures: report
            .failures
            .iter()
            .map(|f| {
                format!(
                    "{} {} {} for model {}: {}",
                    f.corner.label(),
                    f.curve.name(),
                    if f.pin.is_empty() { "derivation" } else { f.pin.as_str() },
                    f.model,
                    f.detail
                )
            })
            .collect(),
        check,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Shell stand-in for the simulator, shared by the end-to-end scenarios:
    /// falling transients fall, rising transients rise, sweeps see a mildly
    /// nonlinear driver whose pullup and pulldown are symmetric.
    const FAKE_SIM: &str = "if grep -q 'falling_' {in}; then \
         printf ' ****** transient analysis\\n  time  voltage\\n 0.0 3.3\\n 2.0e-9 2.6\\n 4.0e-9 1.65\\n 7.0e-9 0.3\\n 1.0e-8 0.0\\n' > {out}; \
         elif grep -q '.TRAN' {in}; then \
         printf ' ****** transient analysis\\n  time  voltage\\n 0.0 0.0\\n 2.0e-9 0.7\\n 4.0e-9 1.65\\n 7.0e-9 3.0\\n 1.0e-8 3.3\\n' > {out}; \
         elif grep -q 'disabled_' {in}; then \
         printf ' ****** dc transfer curves\\n  volt  current\\n -3.3 2.0e-6\\n 0.0 1.0e-6\\n 3.3 -1.0e-6\\n 6.6 -2.0e-6\\n' > {out}; \
         else \
         printf ' ****** dc transfer curves\\n  volt  current\\n -3.3 2.0e-2\\n 0.0 1.0e-2\\n 3.3 -1.0e-2\\n 6.6 -2.0e-2\\n' > {out}; \
         fi";

    fn write_netlist(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn run_with_config(dir: &Path, config_text: &str) -> (RunSummary, String) {
        let config = dir.join("buffer.s2i");
        std::fs::write(&config, config_text).unwrap();
        let opts = RunOptions {
            config,
            outdir: dir.join("out"),
            spice_type: None,
            spice_cmd: Some(FAKE_SIM.to_string()),
            iterate: false,
            cleanup: false,
            timeout: None,
            ibischk: None,
            correlate: false,
        };
        let summary = run(&opts).unwrap();
        let text = std::fs::read_to_string(&summary.ibs_file).unwrap();
        (summary, text)
    }

    const OUTPUT_BUFFER: &str = r#"
[IBIS Ver] 3.2
[File Name] buffer.ibs
[Voltage Range] 3.3 3.0 3.6
[Temperature Range] 27 100 0
[Sim Time] 10n

[Model] driver
[Model Type] Output
[Rising Waveform] R_fixture=50 V_fixture=0
[Falling Waveform] R_fixture=50 V_fixture=3.3

[Component] chip
[Manufacturer] acme
[Spice File] buf.sp
[Pin]
pad  sig  driver  node=net7 input_pin=in
in   din  DUMMY
vdd  vdd  POWER
vss  vss  GND
"#;

    #[test]
    fn test_simple_output_buffer_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_netlist(
            dir.path(),
            "buf.sp",
            "* tapered inverter chain\nM1 net7 n2 vdd vdd pfet w=30u\nM2 net7 n2 vss vss nfet w=15u\nM3 n2 in vdd vdd pfet w=10u\nM4 n2 in vss vss nfet w=5u\n.END\n",
        );
        let (summary, text) = run_with_config(dir.path(), OUTPUT_BUFFER);
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);

        assert!(text.contains("Model_type      Output"));
        assert!(text.contains("[Pullup]"));
        assert!(text.contains("[Pulldown]"));
        assert!(text.contains("[Ramp]"));
        assert!(text.contains("[Rising Waveform]"));
        assert!(text.contains("[Falling Waveform]"));
        assert!(text.trim_end().ends_with("[End]"));
    }

    #[test]
    fn test_symmetric_driver_pullup_matches_pulldown() {
        let dir = tempfile::tempdir().unwrap();
        write_netlist(dir.path(), "buf.sp", "M1 net7 in vdd vdd pfet w=10u\n");
        let config = dir.path().join("buffer.s2i");
        std::fs::write(&config, OUTPUT_BUFFER).unwrap();
        let opts = RunOptions {
            config,
            outdir: dir.path().join("out"),
            spice_type: None,
            spice_cmd: Some(FAKE_SIM.to_string()),
            iterate: false,
            cleanup: false,
            timeout: None,
            ibischk: None,
            correlate: false,
        };
        run(&opts).unwrap();

        // re-load through the library to compare the derived tables
        let mut doc = lib_config::load_config(&opts.config).unwrap();
        let plans = plan_document(&doc).unwrap();
        let analysis_opts = AnalysisOptions {
            outdir: opts.outdir.clone(),
            config_dir: opts.config.parent().map(|p| p.to_path_buf()),
            spice_command: opts.spice_cmd.clone(),
            policy: RunPolicy::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        };
        analyze_document(&mut doc, &plans, &analysis_opts).unwrap();
        let model = doc.find_model("driver").unwrap();
        let pullup = model.pullup.as_ref().unwrap();
        let pulldown = model.pulldown.as_ref().unwrap();

        // fake data is symmetric: pullup current sourced at V=3.3 matches
        // pulldown current sunk at V=0 within 5%
        let i_pu = pullup
            .current_at(3.3 - 3.3, lib_types::Corner::Typ)
            .unwrap()
            .abs();
        let i_pd = pulldown.current_at(0.0, lib_types::Corner::Typ).unwrap().abs();
        let mid = 0.5 * (i_pu + i_pd);
        assert!((i_pu - i_pd).abs() <= 0.05 * mid, "i_pu={i_pu}, i_pd={i_pd}");
    }

    const TRI_STATE: &str = r#"
[IBIS Ver] 3.2
[File Name] tri.ibs
[Voltage Range] 3.3 3.0 3.6
[Temperature Range] 27 100 0
[Sim Time] 10n
[Clamp Tolerance] 1e-5

[Model] tri_driver
[Model Type] 3-state
[Vinl] 0.8
[Vinh] 2.0

[Component] chip
[Manufacturer] acme
[Spice File] tri.sp
[Pin]
pad  sig  tri_driver  input_pin=in enable_pin=oe
in   din  DUMMY
oe   oe   DUMMY
vdd  vdd  POWER
vss  vss  GND
"#;

    #[test]
    fn test_tri_state_runs_enabled_and_disabled_sweeps() {
        let dir = tempfile::tempdir().unwrap();
        write_netlist(
            dir.path(),
            "tri.sp",
            "* nand + inverter tri-state\nM1 pad g1 vdd vdd pfet w=20u\nM2 pad g2 vss vss nfet w=10u\n",
        );
        let (summary, text) = run_with_config(dir.path(), TRI_STATE);
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);

        assert!(text.contains("Model_type      3-state"));
        // disabled sweeps double as clamps
        assert!(text.contains("[GND Clamp]"));
        assert!(text.contains("[POWER Clamp]"));

        // disabled pad current is at clamp tolerance: clamp tables got the
        // microamp-level disabled sweep, and after subtraction the driver
        // tables keep milliamp-level currents
        let out = dir.path().join("out");
        assert!(out.join("dut_pad_typ.sp").exists());
        assert!(out.join("put_pad_typ.sp").exists());
    }

    const OPEN_DRAIN: &str = r#"
[IBIS Ver] 3.2
[File Name] od.ibs
[Voltage Range] 3.3 3.0 3.6
[Temperature Range] 27 100 0
[Sim Time] 10n

[Model] od_driver
[Model Type] Open_drain

[Component] chip
[Manufacturer] acme
[Spice File] od.sp
[Pin]
pad  sig  od_driver  input_pin=in
in   din  DUMMY
vdd  vdd  POWER
vss  vss  GND
"#;

    #[test]
    fn test_open_drain_has_no_pullup_section() {
        let dir = tempfile::tempdir().unwrap();
        write_netlist(
            dir.path(),
            "od.sp",
            "* paralleled nmos pulldown, dummy pmos for rail discovery\nM1 pad in vss vss nfet w=40u\nM2 dummy in vdd vdd pfet w=1u\n",
        );
        let (summary, text) = run_with_config(dir.path(), OPEN_DRAIN);
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);
        assert!(text.contains("Model_type      Open_drain"));
        assert!(text.contains("[Pulldown]"));
        assert!(!text.contains("[Pullup]\n"));
    }

    const SERIES: &str = r#"
[IBIS Ver] 3.2
[File Name] sw.ibs
[Voltage Range] 3.3 3.0 3.6
[Temperature Range] 27 100 0

[Model] series_sw
[Model Type] Series_switch
[Series Vds List] 0 0.5 1.0
[R Series Off] 1meg

[Component] chip
[Manufacturer] acme
[Spice File] sw.sp
[Pin]
pad  sig  series_sw  input_pin=se series_pin=core_out
core_out core NC
se   se   DUMMY
vdd  vdd  POWER
vss  vss  GND
"#;

    #[test]
    fn test_series_switch_emits_only_series_tables() {
        let dir = tempfile::tempdir().unwrap();
        write_netlist(
            dir.path(),
            "sw.sp",
            "* paralleled nmos switch\nM1 pad se core_out vss nfet w=50u\nM2 pad se core_out vss nfet w=50u\n",
        );
        let (summary, text) = run_with_config(dir.path(), SERIES);
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);
        assert!(text.contains("Model_type      Series_switch"));
        assert!(text.contains("[R Series]"));
        assert!(text.contains("[Series MOSFET]"));
        assert!(!text.contains("[Ramp]"));
        assert!(!text.contains("Waveform"));
    }

    const ODD_RAILS: &str = r#"
[IBIS Ver] 3.2
[File Name] odd.ibs
[Voltage Range] 3.3 3.0 3.6
[Temperature Range] 27 100 0
[Sim Time] 10n

[Model] driver
[Model Type] Output

[Component] chip
[Manufacturer] acme
[Spice File] odd.sp
[Pin]
pad   sig   driver  input_pin=in
in    din   DUMMY
vpwr  vpwr  POWER
vssd  vssd  GND
"#;

    #[test]
    fn test_odd_rail_names_bias_at_typ_voltage() {
        let dir = tempfile::tempdir().unwrap();
        write_netlist(
            dir.path(),
            "odd.sp",
            "M1 pad in vpwr vpwr pfet w=10u\nM2 pad in vssd vssd nfet w=5u\n",
        );
        let (summary, _text) = run_with_config(dir.path(), ODD_RAILS);
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);

        let deck = std::fs::read_to_string(dir.path().join("out/put_pad_typ.sp")).unwrap();
        assert!(deck.contains("VCC_IG vpwr 0 DC 3.3"));
        assert!(deck.contains("VGND_IG vssd 0 DC 0.0"));
    }

    const IO_BUFFER: &str = r#"
[IBIS Ver] 3.2
[File Name] io.ibs
[Voltage Range] 3.3 3.0 3.6
[Temperature Range] 27 100 0
[Sim Time] 10n

[Model] io_buf
[Model Type] I/O
[Vinl] 0.8
[Vinh] 2.0
[Rising Waveform] R_fixture=50 V_fixture=0

[Component] chip
[Manufacturer] acme
[Spice File] io_buf.sp
[Pin]
pad  sig  io_buf  input_pin=in_sense enable_pin=oe
in_sense din DUMMY
oe   oe   DUMMY
vdd  vdd  POWER
vss  vss  GND
"#;

    #[test]
    fn test_bidirectional_io_full_curve_set() {
        let dir = tempfile::tempdir().unwrap();
        write_netlist(
            dir.path(),
            "io_buf.sp",
            "M1 pad g1 vdd vdd pfet w=20u\nM2 pad g2 vss vss nfet w=10u\n",
        );
        let (summary, text) = run_with_config(dir.path(), IO_BUFFER);
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);

        assert!(text.contains("Model_type      I/O"));
        for section in [
            "[Pullup]",
            "[Pulldown]",
            "[GND Clamp]",
            "[POWER Clamp]",
            "[Ramp]",
            "[Rising Waveform]",
        ] {
            assert!(text.contains(section), "missing {section}");
        }
        // receiver thresholds
        assert!(text.contains("Vinl = 8.0000e-01"));
        assert!(text.contains("Vinh = 2.0000e+00"));
    }

    #[test]
    fn test_iterate_rerun_is_byte_identical_with_no_spawns() {
        let dir = tempfile::tempdir().unwrap();
        write_netlist(dir.path(), "buf.sp", "M1 net7 in vdd vdd pfet w=10u\n");
        let config = dir.path().join("buffer.s2i");
        std::fs::write(&config, OUTPUT_BUFFER).unwrap();
        let mut opts = RunOptions {
            config,
            outdir: dir.path().join("out"),
            spice_type: None,
            spice_cmd: Some(FAKE_SIM.to_string()),
            iterate: true,
            cleanup: false,
            timeout: None,
            ibischk: None,
            correlate: false,
        };
        let first = run(&opts).unwrap();
        let first_bytes = std::fs::read(&first.ibs_file).unwrap();
        assert!(first.items_run > 0);

        opts.iterate = true;
        let second = run(&opts).unwrap();
        let second_bytes = std::fs::read(&second.ibs_file).unwrap();
        assert_eq!(second.items_run, 0);
        assert_eq!(second.items_reused, first.items_run);
        assert_eq!(first_bytes, second_bytes);
    }

    #[test]
    fn test_correlation_testbench_emitted() {
        let dir = tempfile::tempdir().unwrap();
        write_netlist(dir.path(), "buf.sp", "M1 net7 in vdd vdd pfet w=10u\n");
        let config = dir.path().join("buffer.s2i");
        std::fs::write(&config, OUTPUT_BUFFER).unwrap();
        let opts = RunOptions {
            config,
            outdir: dir.path().join("out"),
            spice_type: None,
            spice_cmd: Some(FAKE_SIM.to_string()),
            iterate: false,
            cleanup: false,
            timeout: None,
            ibischk: None,
            correlate: true,
        };
        run(&opts).unwrap();
        let tb = std::fs::read_to_string(dir.path().join("out/compare_pad.sp")).unwrap();
        assert!(tb.contains(".TRAN"));
        assert!(tb.contains("buffer.ibs"));
    }
}
