// Built-in LaTeX report templates

/// One full-width image per panel.
pub const DEFAULT_TEMPLATE: &str = r"
%tags use double square brackets, see application::template
\documentclass{article}
\usepackage{graphicx}
\usepackage[margin=1in]{geometry}

\graphicspath{ {images/} }
\begin{document}
\title{[[title]] [[if variables]] \\ \large [[variables]] [[end]] [[if description]] \\ \small [[description]] [[end]]}
\date{[[from]]\\to\\[[to]]}
\maketitle
\begin{center}
[[each panels]][[if single_stat]]\begin{minipage}{0.3\textwidth}
\includegraphics[width=\textwidth]{[[image]]}
\end{minipage}
[[else]]\par
\vspace{0.5cm}
\includegraphics[width=\textwidth]{[[image]]}
\par
\vspace{0.5cm}
[[end]][[end]]
\end{center}
\end{document}
";

/// Panels narrower than the grid sit side by side in minipages.
pub const GRID_TEMPLATE: &str = r"
%tags use double square brackets, see application::template
\documentclass{article}
\usepackage{graphicx}
\usepackage[margin=0.5in]{geometry}

\graphicspath{ {images/} }
\begin{document}
\title{[[title]] [[if variables]] \\ \large [[variables]] [[end]] [[if description]] \\ \small [[description]] [[end]]}
\date{[[from]]\\to\\[[to]]}
\maketitle
\begin{center}
[[each panels]][[if partial_width]]\begin{minipage}{[[width]]\textwidth}
\includegraphics[width=\textwidth]{[[image]]}
\end{minipage}
[[else]]\par
\vspace{0.5cm}
\includegraphics[width=\textwidth]{[[image]]}
\par
\vspace{0.5cm}
[[end]][[end]]
\end{center}
\end{document}
";

pub fn builtin(grid_layout: bool) -> &'static str {
    if grid_layout { GRID_TEMPLATE } else { DEFAULT_TEMPLATE }
}
