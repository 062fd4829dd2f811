//! Plot writers: delimited text (CSV/TAB) and the binary ELT format.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use openetran_devices::MeterKind;
use openetran_solver::{MeterInfo, SampleSink};

/// Delimited text output: a header row of column names, then one row per
/// time step.
pub struct TextSink {
    out: BufWriter<File>,
    delim: char,
    names: Vec<String>,
    status: io::Result<()>,
}

impl TextSink {
    pub fn csv(file: File) -> TextSink {
        TextSink::new(file, ',')
    }

    pub fn tab(file: File) -> TextSink {
        TextSink::new(file, '\t')
    }

    fn new(file: File, delim: char) -> TextSink {
        TextSink {
            out: BufWriter::new(file),
            delim,
            names: Vec::new(),
            status: Ok(()),
        }
    }

    fn record(&mut self, r: io::Result<()>) {
        if self.status.is_ok() {
            if let Err(e) = r {
                self.status = Err(e);
            }
        }
    }

    pub fn into_status(self) -> io::Result<()> {
        self.status
    }
}

impl SampleSink for TextSink {
    fn begin(&mut self, meters: &[MeterInfo], _dt: f64, _tmax: f64) {
        self.names = meters.iter().map(|m| m.text_name.clone()).collect();
        let header = format!("Time{}{}\n", self.delim, self.names.join(&self.delim.to_string()));
        let r = self.out.write_all(header.as_bytes());
        self.record(r);
    }

    fn sample(&mut self, t: f64, values: &[f64]) {
        let mut row = format!("{t:e}");
        for v in values {
            row.push(self.delim);
            row.push_str(&format!("{v:e}"));
        }
        row.push('\n');
        let r = self.out.write_all(row.as_bytes());
        self.record(r);
    }

    fn finish(&mut self, _t: f64, _step: usize) {
        let r = self.out.flush();
        self.record(r);
    }
}

const ELT_SIGNATURE: &[u8; 16] = b"OpenETran 1.00\0\0";
const ELT_NAME_SIZE: usize = 9;
const ELT_TITLE_SIZE: usize = 80;
const ELT_HEADER_SIZE: u16 = 496;
const ELT_TITLE1: &str = "EPRI OpenETran Transient Simulation";
const ELT_FBASE: f64 = 376.999;

/// Binary ELT output: a fixed packed header, 9-byte name slots in
/// voltage-then-current order, then per step a double t followed by one
/// double per meter. The header is rewritten at the end with the final
/// time and step count.
pub struct EltSink {
    out: BufWriter<File>,
    n_voltage: u16,
    n_current: u16,
    dt: f64,
    t_finish: f64,
    n_step: u16,
    status: io::Result<()>,
}

impl EltSink {
    pub fn new(file: File) -> EltSink {
        EltSink {
            out: BufWriter::new(file),
            n_voltage: 0,
            n_current: 0,
            dt: 0.0,
            t_finish: 0.0,
            n_step: 0,
            status: Ok(()),
        }
    }

    fn record(&mut self, r: io::Result<()>) {
        if self.status.is_ok() {
            if let Err(e) = r {
                self.status = Err(e);
            }
        }
    }

    pub fn into_status(self) -> io::Result<()> {
        self.status
    }

    fn header_bytes(&self) -> Vec<u8> {
        let mut h = Vec::with_capacity(ELT_HEADER_SIZE as usize);
        h.extend_from_slice(&ELT_HEADER_SIZE.to_le_bytes());
        h.extend_from_slice(ELT_SIGNATURE);
        h.extend_from_slice(&2u16.to_le_bytes()); // version major
        h.extend_from_slice(&0u16.to_le_bytes()); // version minor
        h.extend_from_slice(&ELT_FBASE.to_le_bytes());
        h.extend_from_slice(&1.0f64.to_le_bytes()); // voltage base
        h.extend_from_slice(&0i32.to_le_bytes()); // tStart
        h.extend_from_slice(&0i32.to_le_bytes()); // tFinish
        h.extend_from_slice(&0.0f64.to_le_bytes()); // dTStart
        h.extend_from_slice(&self.t_finish.to_le_bytes());
        h.extend_from_slice(&self.dt.to_le_bytes());
        h.extend_from_slice(&self.n_step.to_le_bytes());
        h.extend_from_slice(&self.n_voltage.to_le_bytes());
        h.extend_from_slice(&self.n_current.to_le_bytes());
        h.extend_from_slice(&(ELT_NAME_SIZE as u16).to_le_bytes());
        h.extend_from_slice(&(ELT_NAME_SIZE as u16).to_le_bytes());
        let idx_voltage = ELT_HEADER_SIZE as i32;
        let idx_current = idx_voltage + (ELT_NAME_SIZE as i32) * self.n_voltage as i32;
        let idx_data = idx_current + (ELT_NAME_SIZE as i32) * self.n_current as i32;
        h.extend_from_slice(&idx_voltage.to_le_bytes());
        h.extend_from_slice(&idx_current.to_le_bytes());
        h.extend_from_slice(&0i32.to_le_bytes()); // idxBaseData
        h.extend_from_slice(&idx_data.to_le_bytes());
        for i in 0..5 {
            let mut title = [0u8; ELT_TITLE_SIZE];
            if i == 0 {
                let bytes = ELT_TITLE1.as_bytes();
                title[..bytes.len()].copy_from_slice(bytes);
            }
            h.extend_from_slice(&title);
        }
        debug_assert_eq!(h.len(), ELT_HEADER_SIZE as usize);
        h
    }
}

/// A 9-byte name slot: space-padded, NUL-terminated at 8 characters; a
/// long name has its underscores opened up before truncation.
fn name_slot(name: &str) -> [u8; ELT_NAME_SIZE] {
    let mut cleaned = name.to_string();
    if cleaned.len() > ELT_NAME_SIZE - 1 {
        cleaned = cleaned.replace('_', " ");
    }
    let mut slot = [b' '; ELT_NAME_SIZE];
    let bytes = cleaned.as_bytes();
    let n = bytes.len().min(ELT_NAME_SIZE - 1);
    slot[..n].copy_from_slice(&bytes[..n]);
    slot[n] = 0;
    slot[ELT_NAME_SIZE - 1] = 0;
    slot
}

fn elt_name(m: &MeterInfo) -> String {
    match m.kind {
        MeterKind::Voltage => format!("V {}_{}{}", m.pole_label, m.from_label, m.to_label),
        MeterKind::ArresterCurrent | MeterKind::ArrbezCurrent => {
            format!("Ia {}_{}", m.pole_label, m.from_label)
        }
        MeterKind::GroundCurrent => format!("PG {}_{}", m.pole_label, m.from_label),
        MeterKind::HouseGroundCurrent => format!("HG {}", m.pole_label),
        MeterKind::TransformerX2 => format!("X2 {}", m.pole_label),
        MeterKind::PipegapCurrent => format!("PD {}_{}", m.pole_label, m.from_label),
    }
}

impl SampleSink for EltSink {
    fn begin(&mut self, meters: &[MeterInfo], dt: f64, tmax: f64) {
        self.dt = dt;
        self.t_finish = tmax;
        self.n_voltage = meters.iter().filter(|m| m.kind.is_voltage()).count() as u16;
        self.n_current = meters.len() as u16 - self.n_voltage;
        let header = self.header_bytes();
        let r = self.out.write_all(&header);
        self.record(r);
        for m in meters {
            let slot = name_slot(&elt_name(m));
            let r = self.out.write_all(&slot);
            self.record(r);
        }
    }

    fn sample(&mut self, t: f64, values: &[f64]) {
        let mut row = Vec::with_capacity(8 * (values.len() + 1));
        row.extend_from_slice(&t.to_le_bytes());
        for v in values {
            row.extend_from_slice(&v.to_le_bytes());
        }
        let r = self.out.write_all(&row);
        self.record(r);
    }

    fn finish(&mut self, t: f64, step: usize) {
        self.t_finish = t;
        self.n_step = step.min(u16::MAX as usize) as u16;
        let header = self.header_bytes();
        let r = self
            .out
            .flush()
            .and_then(|_| self.out.get_mut().seek(SeekFrom::Start(0)))
            .and_then(|_| self.out.get_mut().write_all(&header))
            .and_then(|_| self.out.get_mut().flush());
        self.record(r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elt_header_is_exactly_496_bytes() {
        let sink = EltSink {
            out: BufWriter::new(tempfile()),
            n_voltage: 2,
            n_current: 1,
            dt: 1e-8,
            t_finish: 1e-4,
            n_step: 0,
            status: Ok(()),
        };
        let h = sink.header_bytes();
        assert_eq!(h.len(), 496);
        assert_eq!(&h[2..16], b"OpenETran 1.00");
        // name indices follow the 9-byte slot layout
        let idx_voltage = i32::from_le_bytes(h[80..84].try_into().unwrap());
        let idx_current = i32::from_le_bytes(h[84..88].try_into().unwrap());
        let idx_data = i32::from_le_bytes(h[92..96].try_into().unwrap());
        assert_eq!(idx_voltage, 496);
        assert_eq!(idx_current, 496 + 18);
        assert_eq!(idx_data, 496 + 27);
    }

    #[test]
    fn name_slots_are_nine_bytes_nul_terminated() {
        let slot = name_slot("V 1_10");
        assert_eq!(&slot[..6], b"V 1_10");
        assert_eq!(slot[6], 0);
        assert_eq!(slot[8], 0);

        let long = name_slot("V 12_3456789");
        assert_eq!(long.len(), 9);
        assert_eq!(long[8], 0);
        // underscores opened up when over-length
        assert!(!long[..8].contains(&b'_'));
    }

    fn tempfile() -> File {
        let mut path = std::env::temp_dir();
        path.push(format!("openetran-elt-test-{}", std::process::id()));
        let f = File::create(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        f
    }
}
