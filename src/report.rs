//! Paginated plot documents
//!
//! Every page is an image rendered beforehand into the `<stem>_pages` folder
//! next to the document. The pages are assembled into a LaTeX document that is
//! either written as is (`.tex`) or compiled to PDF (`.pdf`, requires the `pdf`
//! feature).

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Instant,
};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write {1:?}")]
    Io(#[source] io::Error, PathBuf),
    #[error("failed to compile the LaTeX document: {0}")]
    Compile(String),
    #[error("PDF output requires the `pdf` feature, write a `.tex` document instead")]
    PdfDisabled,
    #[error("unknown document format for {0:?}, expected a `.pdf` or `.tex` extension")]
    Format(PathBuf),
}
type Result<T> = std::result::Result<T, ReportError>;

/// Document output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Pdf,
    Latex,
}
impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .as_deref()
        {
            Some("pdf") => Some(Format::Pdf),
            Some("tex") => Some(Format::Latex),
            _ => None,
        }
    }
}

/// Default document path, a PDF document requires the `pdf` feature
#[cfg(feature = "pdf")]
pub const DEFAULT_OUTPUT: &str = "plot.pdf";
/// Default document path, a PDF document requires the `pdf` feature
#[cfg(not(feature = "pdf"))]
pub const DEFAULT_OUTPUT: &str = "plot.tex";

/// A PDF document without any page
fn empty_pdf() -> Vec<u8> {
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [] /Count 0 >>",
    ];
    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).bytes());
    }
    let xref = pdf.len();
    pdf.extend(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).bytes());
    for offset in offsets {
        pdf.extend(format!("{:010} 00000 n \n", offset).bytes());
    }
    pdf.extend(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .bytes(),
    );
    pdf
}

#[cfg(feature = "pdf")]
fn compile(latex: &str) -> Result<Vec<u8>> {
    tectonic::latex_to_pdf(latex).map_err(|e| ReportError::Compile(e.to_string()))
}
#[cfg(not(feature = "pdf"))]
fn compile(_latex: &str) -> Result<Vec<u8>> {
    Err(ReportError::PdfDisabled)
}

/// A multi-page document, one image per page
#[derive(Debug)]
pub struct Document {
    output: PathBuf,
    format: Format,
    page_dir: PathBuf,
    pages: Vec<PathBuf>,
}
impl Document {
    /// Creates an empty document that will be saved to `output`
    pub fn new<P: AsRef<Path>>(output: P) -> Result<Self> {
        let output = output.as_ref().to_path_buf();
        let format = Format::from_path(&output).ok_or_else(|| ReportError::Format(output.clone()))?;
        if format == Format::Pdf && cfg!(not(feature = "pdf")) {
            return Err(ReportError::PdfDisabled);
        }
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let page_dir = output.with_file_name(format!("{stem}_pages"));
        Ok(Self {
            output,
            format,
            page_dir,
            pages: vec![],
        })
    }
    pub fn output(&self) -> &Path {
        &self.output
    }
    /// Folder holding the page images
    pub fn page_dir(&self) -> &Path {
        &self.page_dir
    }
    /// Number of pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
    /// Path where the next page image is expected
    pub fn next_page(&mut self) -> Result<PathBuf> {
        if self.pages.is_empty() {
            fs::create_dir_all(&self.page_dir)
                .map_err(|e| ReportError::Io(e, self.page_dir.clone()))?;
            self.page_dir = fs::canonicalize(&self.page_dir)
                .map_err(|e| ReportError::Io(e, self.page_dir.clone()))?;
        }
        Ok(self
            .page_dir
            .join(format!("page-{:04}.png", self.pages.len())))
    }
    /// Appends a rendered page
    pub fn push(&mut self, page: PathBuf) {
        self.pages.push(page);
    }
    /// LaTeX source of the document
    pub fn to_latex(&self) -> String {
        let pages = self
            .pages
            .iter()
            .map(|page| {
                format!(
                    r#"
\begin{{center}}
\includegraphics[width=\textwidth,height=0.95\textheight,keepaspectratio]{{{:?}}}
\end{{center}}
\clearpage"#,
                    page
                )
            })
            .collect::<Vec<String>>()
            .join("\n");
        format!(
            r#"\documentclass{{article}}
\usepackage[margin=1cm]{{geometry}}
\usepackage{{graphicx}}
\pagestyle{{empty}}

\begin{{document}}
{}
\end{{document}}
"#,
            pages
        )
    }
    /// Writes the document, returns the number of pages
    pub fn save(self) -> Result<usize> {
        let n_page = self.pages.len();
        let contents = match self.format {
            Format::Latex => self.to_latex().into_bytes(),
            // LaTeX does not output documents without pages
            Format::Pdf if self.pages.is_empty() => {
                log::warn!("no page to plot, {:?} has no page", self.output);
                empty_pdf()
            }
            Format::Pdf => {
                let now = Instant::now();
                log::info!("Compiling {:?} ...", self.output);
                let pdf = compile(&self.to_latex());
                log::info!(" ... compiled in {}s", now.elapsed().as_secs());
                match pdf {
                    Ok(pdf) => pdf,
                    Err(e) => {
                        self.discard()?;
                        return Err(e);
                    }
                }
            }
        };
        let mut doc =
            fs::File::create(&self.output).map_err(|e| ReportError::Io(e, self.output.clone()))?;
        doc.write_all(&contents)
            .map_err(|e| ReportError::Io(e, self.output.clone()))?;
        if self.format == Format::Pdf {
            self.discard()?;
        }
        Ok(n_page)
    }
    /// Removes the page images
    pub fn discard(self) -> Result<()> {
        if self.page_dir.exists() {
            fs::remove_dir_all(&self.page_dir).map_err(|e| ReportError::Io(e, self.page_dir))?;
        }
        Ok(())
    }
}
