//! LIBSVM text model format
//!
//! The layout written by `svm_save_model`: a header of `key value...` lines,
//! a line reading `SV`, then one line per support vector holding its
//! `nr_class - 1` coefficients followed by 1-based `index:value` pairs.
//!
//! The format has no field for the input dimensionality. When no support
//! vector touches the last input feature, the first support vector is
//! written with an explicit `index:0` entry for it so the dimensionality can
//! be recovered as the largest index on reload.

use crate::core::{KernelType, MachineType, Result, SVMError, SparseVector};
use crate::kernel::KernelParams;
use crate::solver::SvmModel;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Write `model` to a file in LIBSVM format
pub fn save_model<P: AsRef<Path>>(model: &SvmModel, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_model(model, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Read a LIBSVM model file
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<SvmModel> {
    let file = File::open(path)?;
    read_model(BufReader::new(file))
}

pub fn write_model<W: Write>(model: &SvmModel, mut w: W) -> Result<()> {
    let kernel = &model.kernel;
    writeln!(w, "svm_type {}", model.machine_type.libsvm_name())?;
    writeln!(w, "kernel_type {}", kernel.kernel_type.libsvm_name())?;
    if kernel.kernel_type.uses_degree() {
        writeln!(w, "degree {}", kernel.degree)?;
    }
    if kernel.kernel_type.uses_gamma() {
        writeln!(w, "gamma {}", kernel.gamma)?;
    }
    if kernel.kernel_type.uses_coef0() {
        writeln!(w, "coef0 {}", kernel.coef0)?;
    }

    writeln!(w, "nr_class {}", model.n_classes())?;
    writeln!(w, "total_sv {}", model.total_sv())?;
    write_list(&mut w, "rho", &model.rho)?;
    if !model.labels.is_empty() {
        write_list(&mut w, "label", &model.labels)?;
    }
    if let (Some(a), Some(b)) = (&model.prob_a, &model.prob_b) {
        write_list(&mut w, "probA", a)?;
        write_list(&mut w, "probB", b)?;
    }
    if !model.n_sv.is_empty() {
        write_list(&mut w, "nr_sv", &model.n_sv)?;
    }

    writeln!(w, "SV")?;
    let needs_marker = model.n_features > 0
        && !model
            .support_vectors
            .iter()
            .any(|sv| sv.max_index() == Some(model.n_features - 1));

    for (i, sv) in model.support_vectors.iter().enumerate() {
        for row in &model.sv_coef {
            write!(w, "{} ", row[i])?;
        }
        for (&index, &value) in sv.indices.iter().zip(&sv.values) {
            write!(w, "{}:{} ", index + 1, value)?;
        }
        if i == 0 && needs_marker {
            write!(w, "{}:0 ", model.n_features)?;
        }
        writeln!(w)?;
    }

    Ok(())
}

fn write_list<W: Write, T: Display>(w: &mut W, key: &str, values: &[T]) -> Result<()> {
    write!(w, "{key}")?;
    for v in values {
        write!(w, " {v}")?;
    }
    writeln!(w)?;
    Ok(())
}

/// Header fields collected before the `SV` marker
#[derive(Default)]
struct Header {
    machine_type: Option<MachineType>,
    kernel_type: Option<KernelType>,
    degree: Option<i32>,
    gamma: Option<f64>,
    coef0: Option<f64>,
    nr_class: Option<usize>,
    total_sv: Option<usize>,
    rho: Option<Vec<f64>>,
    labels: Option<Vec<i64>>,
    prob_a: Option<Vec<f64>>,
    prob_b: Option<Vec<f64>>,
    n_sv: Option<Vec<usize>>,
}

pub fn read_model<R: BufRead>(reader: R) -> Result<SvmModel> {
    let mut lines = reader.lines().enumerate().map(|(i, line)| (i + 1, line));
    let mut header = Header::default();

    loop {
        let (line_no, line) = match lines.next() {
            Some((n, line)) => (n, line?),
            None => {
                return Err(SVMError::ModelFormatError {
                    line: 0,
                    message: "Missing SV section".to_string(),
                })
            }
        };
        let mut tokens = line.split_whitespace();
        let key = match tokens.next() {
            Some(key) => key,
            None => continue,
        };
        let rest: Vec<&str> = tokens.collect();
        let field = Field {
            line: line_no,
            key,
            values: &rest,
        };

        match key {
            "SV" => break,
            "svm_type" => header.machine_type = Some(field.single()?.parse()?),
            "kernel_type" => header.kernel_type = Some(field.single()?.parse()?),
            "degree" => header.degree = Some(field.number()?),
            "gamma" => header.gamma = Some(field.number()?),
            "coef0" => header.coef0 = Some(field.number()?),
            "nr_class" => header.nr_class = Some(field.number()?),
            "total_sv" => header.total_sv = Some(field.number()?),
            "rho" => header.rho = Some(field.list()?),
            "label" => header.labels = Some(field.list()?),
            "probA" => header.prob_a = Some(field.list()?),
            "probB" => header.prob_b = Some(field.list()?),
            "nr_sv" => header.n_sv = Some(field.list()?),
            _ => return Err(field.error(format!("Unknown header key `{key}`"))),
        }
    }

    let missing = |what: &str| SVMError::ModelFormatError {
        line: 0,
        message: format!("Missing `{what}` in header"),
    };
    let machine_type = header.machine_type.ok_or_else(|| missing("svm_type"))?;
    let kernel_type = header.kernel_type.ok_or_else(|| missing("kernel_type"))?;
    if kernel_type == KernelType::Precomputed {
        return Err(SVMError::UnsupportedKernelType(kernel_type.to_string()));
    }
    let nr_class = header.nr_class.ok_or_else(|| missing("nr_class"))?;
    let total_sv = header.total_sv.ok_or_else(|| missing("total_sv"))?;
    let rho = header.rho.ok_or_else(|| missing("rho"))?;

    let n_coef = nr_class.saturating_sub(1);
    let mut sv_coef = vec![Vec::with_capacity(total_sv); n_coef];
    let mut support_vectors = Vec::with_capacity(total_sv);
    let mut n_features = 0;

    for (line_no, line) in lines {
        let line = line?;
        let mut tokens = line.split_whitespace().peekable();
        if tokens.peek().is_none() {
            continue;
        }
        let error = |message: String| SVMError::ModelFormatError {
            line: line_no,
            message,
        };

        for row in sv_coef.iter_mut() {
            let token = tokens
                .next()
                .ok_or_else(|| error("Missing support vector coefficient".to_string()))?;
            let coef = token
                .parse::<f64>()
                .map_err(|_| error(format!("Invalid coefficient: {token}")))?;
            row.push(coef);
        }

        let mut indices = Vec::new();
        let mut values = Vec::new();
        for token in tokens {
            let (index_str, value_str) = token
                .split_once(':')
                .ok_or_else(|| error(format!("Invalid feature format: {token}")))?;
            let index = index_str
                .parse::<usize>()
                .ok()
                .filter(|&i| i > 0)
                .ok_or_else(|| error(format!("Invalid feature index: {index_str}")))?;
            let value = value_str
                .parse::<f64>()
                .map_err(|_| error(format!("Invalid feature value: {value_str}")))?;

            n_features = n_features.max(index);
            if value != 0.0 {
                indices.push(index - 1);
                values.push(value);
            }
        }
        support_vectors.push(SparseVector::new(indices, values));
    }

    if support_vectors.len() != total_sv {
        return Err(SVMError::ModelFormatError {
            line: 0,
            message: format!(
                "Header declares {total_sv} support vectors, found {}",
                support_vectors.len()
            ),
        });
    }

    Ok(SvmModel {
        machine_type,
        kernel: KernelParams {
            kernel_type,
            degree: header.degree.unwrap_or(3),
            gamma: header.gamma.unwrap_or(0.0),
            coef0: header.coef0.unwrap_or(0.0),
        },
        n_features,
        labels: header.labels.unwrap_or_default(),
        rho,
        prob_a: header.prob_a,
        prob_b: header.prob_b,
        n_sv: header.n_sv.unwrap_or_default(),
        sv_coef,
        support_vectors,
    })
}

/// One header line split into key and values
struct Field<'a> {
    line: usize,
    key: &'a str,
    values: &'a [&'a str],
}

impl Field<'_> {
    fn error(&self, message: String) -> SVMError {
        SVMError::ModelFormatError {
            line: self.line,
            message,
        }
    }

    fn single(&self) -> Result<&str> {
        match self.values {
            [value] => Ok(*value),
            _ => Err(self.error(format!("`{}` takes exactly one value", self.key))),
        }
    }

    fn number<T: std::str::FromStr>(&self) -> Result<T> {
        let value = self.single()?;
        value
            .parse()
            .map_err(|_| self.error(format!("Invalid `{}` value: {value}", self.key)))
    }

    fn list<T: std::str::FromStr>(&self) -> Result<Vec<T>> {
        self.values
            .iter()
            .map(|v| {
                v.parse()
                    .map_err(|_| self.error(format!("Invalid `{}` value: {v}", self.key)))
            })
            .collect()
    }
}
